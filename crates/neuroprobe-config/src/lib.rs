// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neuroprobe Configuration System
//!
//! Rig configuration: atlas geometry, manipulator mount, drive speeds and
//! logging, read from `neuroprobe_configuration.toml` and then overridden by
//! `NEUROPROBE_*` environment variables and command-line values.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use neuroprobe_config::{load_config, validate_config};
//!
//! let config = load_config(None, None)?;
//! validate_config(&config)?;
//!
//! println!("Base speed: {} mm/s", config.automation.base_speed);
//! println!("Atlas resolution: {:?} mm", config.atlas.resolution);
//! # Ok::<(), neuroprobe_config::ConfigError>(())
//! ```
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Conversion into coordinate and drive types lives in the `neuroprobe`
//! umbrella crate; this crate depends on nothing but serde and toml.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

pub use serde;

/// Errors from locating, reading or checking a rig configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No rig configuration found: {0}")]
    FileNotFound(String),

    #[error("Cannot read rig configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed rig configuration: {0}")]
    ParseError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Bad configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::ParseError(err.message().to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: NeuroprobeConfig = toml::from_str("").unwrap();
        assert_eq!(config.automation.base_speed, AutomationConfig::default().base_speed);
        assert_eq!(config.surface.max_search_doublings, 8);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err: ConfigError = toml::from_str::<NeuroprobeConfig>("[atlas")
            .unwrap_err()
            .into();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
