// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration sections turned into the typed values the crates consume.

use std::time::Duration;

use neuroprobe_automation::{EchoConfig, SpeedProfile};
use neuroprobe_config::{
    AtlasConfig, AutomationConfig, ConfigError, ManipulatorConfig, SurfaceConfig,
};
use neuroprobe_coordinates::{
    CoordinateError, CoordinateSpace, CoordinateTransform, Handedness, SurfaceFinder, Vector3,
};
use neuroprobe_link::SimulatorConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
}

pub type SetupResult<T> = Result<T, SetupError>;

pub fn coordinate_space(atlas: &AtlasConfig) -> SetupResult<CoordinateSpace> {
    Ok(CoordinateSpace::new(
        atlas.name.clone(),
        Vector3::from(atlas.dimensions),
        Vector3::from(atlas.resolution),
        Vector3::from(atlas.reference_origin),
    )?)
}

pub fn handedness(manipulator: &ManipulatorConfig) -> SetupResult<Handedness> {
    match manipulator.handedness.as_str() {
        "right" => Ok(Handedness::Right),
        "left" => Ok(Handedness::Left),
        other => Err(ConfigError::InvalidValue(format!(
            "manipulator.handedness must be 'right' or 'left', got '{}'",
            other
        ))
        .into()),
    }
}

/// Atlas ↔ transformed mapping for the configured manipulator mount
pub fn manipulator_transform(manipulator: &ManipulatorConfig) -> SetupResult<CoordinateTransform> {
    Ok(CoordinateTransform::manipulator(
        manipulator.num_axes,
        handedness(manipulator)?,
        manipulator.yaw,
        manipulator.pitch,
    )?)
}

pub fn simulator_config(manipulator: &ManipulatorConfig) -> SimulatorConfig {
    SimulatorConfig {
        num_axes: manipulator.num_axes,
        dimensions: manipulator.dimensions,
        time_scale: manipulator.time_scale,
        ..SimulatorConfig::default()
    }
}

pub fn speed_profile(automation: &AutomationConfig) -> SpeedProfile {
    SpeedProfile {
        base_speed: automation.base_speed,
        per_mm_speed_bonus: automation.per_mm_speed_bonus,
        near_target_distance: automation.near_target_distance,
        past_target_distance: automation.past_target_distance,
        near_target_speed_multiplier: automation.near_target_speed_multiplier,
        exit_speed_multiplier: automation.exit_speed_multiplier,
        dura_margin_distance: automation.dura_margin_distance,
    }
}

pub fn echo_config(echo: &neuroprobe_config::EchoConfig) -> EchoConfig {
    EchoConfig {
        poll_interval: Duration::from_millis(echo.poll_interval_ms),
        log_rate_hz: echo.log_rate_hz,
        dead_band: echo.dead_band,
    }
}

pub fn surface_finder(surface: &SurfaceConfig) -> SurfaceFinder {
    SurfaceFinder::new(surface.max_search_doublings)
}
