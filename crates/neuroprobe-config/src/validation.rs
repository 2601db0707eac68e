// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every violation before failing so a bad file is fixed in one pass.

use crate::{ConfigError, ConfigResult, NeuroprobeConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotPositive { field: String, value: f64 },
    Negative { field: String, value: f64 },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} = {} must be positive", field, value)
            }
            Self::Negative { field, value } => {
                write!(f, "{} = {} must not be negative", field, value)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Positive atlas dimensions, resolution and manipulator travel
/// - Positive speeds, multipliers, echo rate and poll interval
/// - Non-negative distances
/// - Supported axis counts and handedness names
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &NeuroprobeConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_geometry(config, &mut errors);
    validate_automation(config, &mut errors);
    validate_echo(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn require_positive(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(ConfigValidationError::NotPositive {
            field: field.to_string(),
            value,
        });
    }
}

fn require_non_negative(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    if !value.is_finite() || value < 0.0 {
        errors.push(ConfigValidationError::Negative {
            field: field.to_string(),
            value,
        });
    }
}

fn validate_geometry(config: &NeuroprobeConfig, errors: &mut Vec<ConfigValidationError>) {
    const AXES: [&str; 3] = ["ap", "ml", "dv"];
    for (axis, value) in AXES.iter().zip(config.atlas.dimensions) {
        require_positive(&format!("atlas.dimensions.{}", axis), value, errors);
    }
    for (axis, value) in AXES.iter().zip(config.atlas.resolution) {
        require_positive(&format!("atlas.resolution.{}", axis), value, errors);
    }

    let manipulator = &config.manipulator;
    if manipulator.num_axes != 3 && manipulator.num_axes != 4 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "manipulator.num_axes".to_string(),
            reason: format!("must be 3 or 4, got {}", manipulator.num_axes),
        });
    }
    for (axis, value) in manipulator.dimensions.iter().enumerate() {
        require_positive(&format!("manipulator.dimensions[{}]", axis), *value, errors);
    }
    if manipulator.handedness != "right" && manipulator.handedness != "left" {
        errors.push(ConfigValidationError::InvalidValue {
            field: "manipulator.handedness".to_string(),
            reason: "must be 'right' or 'left'".to_string(),
        });
    }
    require_non_negative("manipulator.time_scale", manipulator.time_scale, errors);
}

fn validate_automation(config: &NeuroprobeConfig, errors: &mut Vec<ConfigValidationError>) {
    let automation = &config.automation;
    require_positive("automation.base_speed", automation.base_speed, errors);
    require_positive(
        "automation.near_target_speed_multiplier",
        automation.near_target_speed_multiplier,
        errors,
    );
    require_positive(
        "automation.exit_speed_multiplier",
        automation.exit_speed_multiplier,
        errors,
    );
    require_non_negative("automation.per_mm_speed_bonus", automation.per_mm_speed_bonus, errors);
    require_non_negative(
        "automation.near_target_distance",
        automation.near_target_distance,
        errors,
    );
    require_non_negative(
        "automation.past_target_distance",
        automation.past_target_distance,
        errors,
    );
    require_non_negative(
        "automation.dura_margin_distance",
        automation.dura_margin_distance,
        errors,
    );
    require_non_negative("automation.entry_clearance", automation.entry_clearance, errors);
}

fn validate_echo(config: &NeuroprobeConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.echo.poll_interval_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "echo.poll_interval_ms".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    require_positive("echo.log_rate_hz", config.echo.log_rate_hz, errors);
    require_non_negative("echo.dead_band", config.echo.dead_band, errors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NeuroprobeConfig::default();
        let result = validate_config(&config);
        if let Err(e) = &result {
            eprintln!("Validation error: {}", e);
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_resolution() {
        let mut config = NeuroprobeConfig::default();
        config.atlas.resolution[1] = 0.0;

        let Err(ConfigError::ValidationError(msg)) = validate_config(&config) else {
            panic!("expected a validation error");
        };
        assert!(msg.contains("atlas.resolution.ml"));
    }

    #[test]
    fn test_collects_every_violation() {
        let mut config = NeuroprobeConfig::default();
        config.automation.base_speed = 0.0;
        config.automation.past_target_distance = -0.1;
        config.manipulator.num_axes = 6;

        let Err(ConfigError::ValidationError(msg)) = validate_config(&config) else {
            panic!("expected a validation error");
        };
        assert!(msg.contains("automation.base_speed"));
        assert!(msg.contains("automation.past_target_distance"));
        assert!(msg.contains("manipulator.num_axes"));
    }

    #[test]
    fn test_zero_near_target_distance_is_allowed() {
        let mut config = NeuroprobeConfig::default();
        config.automation.near_target_distance = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_unknown_handedness() {
        let mut config = NeuroprobeConfig::default();
        config.manipulator.handedness = "ambidextrous".to_string();
        assert!(validate_config(&config).is_err());
    }
}
