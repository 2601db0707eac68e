// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Drive speeds and landmark distances.
//!
//! ```text
//! speed = base_speed × multiplier + per_mm_speed_bonus × total_distance
//! ```
//!
//! `total_distance` is the insertion depth from dura to target, so long
//! insertions settle in roughly the same time as short ones.

use serde::{Deserialize, Serialize};

use crate::error::{DriveError, DriveResult};

/// Speed and distance constants for one probe's drives (mm, mm/s)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub base_speed: f64,
    pub per_mm_speed_bonus: f64,
    /// Depth above target where the slow approach begins; 0 disables it
    pub near_target_distance: f64,
    /// Overshoot past the target before returning to it
    pub past_target_distance: f64,
    pub near_target_speed_multiplier: f64,
    /// Applied once the probe is confirmed outside the dura
    pub exit_speed_multiplier: f64,
    /// Retraction above dura before the lateral move home
    pub dura_margin_distance: f64,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            base_speed: 0.005,
            per_mm_speed_bonus: 0.001,
            near_target_distance: 0.05,
            past_target_distance: 0.05,
            near_target_speed_multiplier: 2.0 / 3.0,
            exit_speed_multiplier: 10.0,
            dura_margin_distance: 0.1,
        }
    }
}

impl SpeedProfile {
    /// Check every constant
    ///
    /// # Errors
    ///
    /// Returns `DriveError::Config` listing all violations.
    pub fn validate(&self) -> DriveResult<()> {
        let mut errors = Vec::new();
        let positive = [
            ("base_speed", self.base_speed),
            ("near_target_speed_multiplier", self.near_target_speed_multiplier),
            ("exit_speed_multiplier", self.exit_speed_multiplier),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("{name} must be positive, got {value}"));
            }
        }
        let non_negative = [
            ("per_mm_speed_bonus", self.per_mm_speed_bonus),
            ("near_target_distance", self.near_target_distance),
            ("past_target_distance", self.past_target_distance),
            ("dura_margin_distance", self.dura_margin_distance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("{name} must not be negative, got {value}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DriveError::Config(errors.join("; ")))
        }
    }

    /// Phase speed for a multiplier and the total insertion depth
    ///
    /// # Errors
    ///
    /// Returns `DriveError::Config` when the result is not strictly positive.
    pub fn speed(&self, multiplier: f64, total_distance: f64) -> DriveResult<f64> {
        let speed = self.base_speed * multiplier + self.per_mm_speed_bonus * total_distance.abs();
        if speed.is_finite() && speed > 0.0 {
            Ok(speed)
        } else {
            Err(DriveError::Config(format!(
                "drive speed must be positive, got {speed} (multiplier {multiplier})"
            )))
        }
    }

    pub fn insertion_speed(&self, total_distance: f64) -> DriveResult<f64> {
        self.speed(1.0, total_distance)
    }

    pub fn near_target_speed(&self, total_distance: f64) -> DriveResult<f64> {
        self.speed(self.near_target_speed_multiplier, total_distance)
    }

    pub fn exit_speed(&self, total_distance: f64) -> DriveResult<f64> {
        self.speed(self.exit_speed_multiplier, total_distance)
    }
}
