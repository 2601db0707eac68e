// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Locating and layering the rig configuration
//!
//! Later layers win: TOML file, then `NEUROPROBE_*` environment variables,
//! then command-line values.

use crate::{ConfigError, ConfigResult, NeuroprobeConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CONFIG_FILE_NAME: &str = "neuroprobe_configuration.toml";

/// Find the neuroprobe configuration file
///
/// Search order:
/// 1. `NEUROPROBE_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// `ConfigError::FileNotFound` lists every location tried
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEUROPROBE_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEUROPROBE_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        search_paths.extend(cwd.ancestors().skip(1).take(5).map(|p| p.join(CONFIG_FILE_NAME)));
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let tried: Vec<String> = search_paths.iter().map(|p| p.display().to_string()).collect();
    Err(ConfigError::FileNotFound(format!(
        "{} (tried {}; set NEUROPROBE_CONFIG_PATH to point elsewhere)",
        CONFIG_FILE_NAME,
        tried.join(", ")
    )))
}

/// Read `config_path` (or the discovered file) and apply both override layers
///
/// Validation is left to [`crate::validate_config`].
///
/// # Errors
///
/// Missing file, unreadable file, malformed TOML, or an override value that
/// does not parse.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeuroprobeConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: NeuroprobeConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue(format!("{} = '{}' does not parse", key, value))
}

/// Overwrite `target` with `value`, or fail naming `key`
fn set_parsed<T: FromStr>(target: &mut T, key: &str, value: &str) -> ConfigResult<()> {
    *target = value.trim().parse::<T>().map_err(|_| invalid(key, value))?;
    Ok(())
}

/// Environment layer:
/// - `NEUROPROBE_LOG_LEVEL` -> `system.log_level`
/// - `NEUROPROBE_DEBUG_MODE` -> `system.debug`
/// - `NEUROPROBE_LOG_DIR` -> `logging.log_dir`
/// - `NEUROPROBE_FILE_LOGGING` -> `logging.file_logging`
/// - `NEUROPROBE_OUTPUT_LOG` -> `logging.output_log`
/// - `NEUROPROBE_NUM_AXES` -> `manipulator.num_axes`
/// - `NEUROPROBE_TIME_SCALE` -> `manipulator.time_scale`
/// - `NEUROPROBE_BASE_SPEED` -> `automation.base_speed`
/// - `NEUROPROBE_WRITE_PRIORITY` -> `automation.write_priority`
/// - `NEUROPROBE_ECHO_POLL_INTERVAL_MS` -> `echo.poll_interval_ms`
///
/// # Errors
///
/// `ConfigError::InvalidValue` naming the variable whose value does not parse
pub fn apply_environment_overrides(config: &mut NeuroprobeConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("NEUROPROBE_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("NEUROPROBE_DEBUG_MODE") {
        config.system.debug = parse_bool("NEUROPROBE_DEBUG_MODE", &value)?;
    }

    if let Ok(value) = env::var("NEUROPROBE_LOG_DIR") {
        config.logging.log_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("NEUROPROBE_FILE_LOGGING") {
        config.logging.file_logging = parse_bool("NEUROPROBE_FILE_LOGGING", &value)?;
    }
    if let Ok(value) = env::var("NEUROPROBE_OUTPUT_LOG") {
        config.logging.output_log = PathBuf::from(value);
    }

    if let Ok(value) = env::var("NEUROPROBE_NUM_AXES") {
        set_parsed(&mut config.manipulator.num_axes, "NEUROPROBE_NUM_AXES", &value)?;
    }
    if let Ok(value) = env::var("NEUROPROBE_TIME_SCALE") {
        set_parsed(&mut config.manipulator.time_scale, "NEUROPROBE_TIME_SCALE", &value)?;
    }

    if let Ok(value) = env::var("NEUROPROBE_BASE_SPEED") {
        set_parsed(&mut config.automation.base_speed, "NEUROPROBE_BASE_SPEED", &value)?;
    }
    if let Ok(value) = env::var("NEUROPROBE_WRITE_PRIORITY") {
        set_parsed(&mut config.automation.write_priority, "NEUROPROBE_WRITE_PRIORITY", &value)?;
    }

    if let Ok(value) = env::var("NEUROPROBE_ECHO_POLL_INTERVAL_MS") {
        set_parsed(&mut config.echo.poll_interval_ms, "NEUROPROBE_ECHO_POLL_INTERVAL_MS", &value)?;
    }
    Ok(())
}

/// Command-line layer, keyed by bare field name (`"base_speed"`, `"num_axes"`, ...)
///
/// # Errors
///
/// `ConfigError::InvalidValue` naming the key whose value does not parse
pub fn apply_cli_overrides(
    config: &mut NeuroprobeConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = parse_bool("debug", value)?;
    }
    if let Some(value) = cli_args.get("log_dir") {
        config.logging.log_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("output_log") {
        config.logging.output_log = PathBuf::from(value);
    }

    if let Some(value) = cli_args.get("num_axes") {
        set_parsed(&mut config.manipulator.num_axes, "num_axes", value)?;
    }
    if let Some(value) = cli_args.get("time_scale") {
        set_parsed(&mut config.manipulator.time_scale, "time_scale", value)?;
    }

    if let Some(value) = cli_args.get("base_speed") {
        set_parsed(&mut config.automation.base_speed, "base_speed", value)?;
    }
    if let Some(value) = cli_args.get("near_target_distance") {
        set_parsed(&mut config.automation.near_target_distance, "near_target_distance", value)?;
    }
    if let Some(value) = cli_args.get("entry_clearance") {
        set_parsed(&mut config.automation.entry_clearance, "entry_clearance", value)?;
    }
    if let Some(value) = cli_args.get("write_priority") {
        set_parsed(&mut config.automation.write_priority, "write_priority", value)?;
    }

    if let Some(value) = cli_args.get("max_search_doublings") {
        set_parsed(&mut config.surface.max_search_doublings, "max_search_doublings", value)?;
    }
    Ok(())
}
