// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `neuroprobe_configuration.toml`. Lengths are millimetres, speeds mm/s.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeuroprobeConfig {
    pub system: SystemConfig,
    pub logging: LoggingConfig,
    pub atlas: AtlasConfig,
    pub manipulator: ManipulatorConfig,
    pub automation: AutomationConfig,
    pub echo: EchoConfig,
    pub surface: SurfaceConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub debug: bool,
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

/// Log file output and retention
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file_logging: bool,
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub retention_runs: usize,
    /// Experiment output log (JSON lines); empty disables it
    pub output_log: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
            output_log: PathBuf::new(),
        }
    }
}

/// Reference atlas geometry, AP/ML/DV order
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub name: String,
    pub dimensions: [f64; 3],
    pub resolution: [f64; 3],
    /// Bregma, measured from the volume's corner
    pub reference_origin: [f64; 3],
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            name: "ccf25".to_string(),
            dimensions: [13.2, 11.4, 8.0],
            resolution: [0.025, 0.025, 0.025],
            reference_origin: [5.4, 5.739, 0.332],
        }
    }
}

/// Physical manipulator geometry and mounting
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManipulatorConfig {
    /// 3 or 4
    pub num_axes: u8,
    /// Travel range per axis
    pub dimensions: [f64; 4],
    /// "right" or "left"
    pub handedness: String,
    /// Mounting yaw, degrees
    pub yaw: f64,
    /// Mounting pitch, degrees (three-axis devices only)
    pub pitch: f64,
    /// Simulator wall-clock seconds per simulated second; 0 moves instantly
    pub time_scale: f64,
}

impl Default for ManipulatorConfig {
    fn default() -> Self {
        Self {
            num_axes: 4,
            dimensions: [20.0; 4],
            handedness: "right".to_string(),
            yaw: 0.0,
            pitch: 0.0,
            time_scale: 0.0,
        }
    }
}

/// Drive speeds and landmark distances
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub base_speed: f64,
    pub per_mm_speed_bonus: f64,
    pub near_target_distance: f64,
    pub past_target_distance: f64,
    pub near_target_speed_multiplier: f64,
    pub exit_speed_multiplier: f64,
    pub dura_margin_distance: f64,
    /// Clearance between the brain surface and the entry coordinate
    pub entry_clearance: f64,
    /// Priority passed with every write-gate request
    pub write_priority: f64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            base_speed: 0.005,
            per_mm_speed_bonus: 0.001,
            near_target_distance: 0.05,
            past_target_distance: 0.05,
            near_target_speed_multiplier: 2.0 / 3.0,
            exit_speed_multiplier: 10.0,
            dura_margin_distance: 0.1,
            entry_clearance: 1.0,
            write_priority: 0.0,
        }
    }
}

/// Position echo loop
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EchoConfig {
    pub poll_interval_ms: u64,
    pub log_rate_hz: f64,
    pub dead_band: f64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            log_rate_hz: 4.0,
            dead_band: 0.001,
        }
    }
}

/// Brain surface search
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub max_search_doublings: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            max_search_doublings: 8,
        }
    }
}
