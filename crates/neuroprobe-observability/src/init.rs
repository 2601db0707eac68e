// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization for neuroprobe
//!
//! Console output always; with `file-logging`, a timestamped run folder of
//! per-crate JSON log files plus retention cleanup of older runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::CrateDebugFlags;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_RETENTION_DAYS: u64 = 36_500;

/// Initialize console-only logging
///
/// Used by tools and tests. `default_level` applies to every crate whose
/// debug flag is not set.
///
/// # Errors
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_console_logging(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(debug_flags.to_filter_string(default_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
        .try_init()
        .context("Failed to install console logger")?;
    Ok(())
}

#[cfg(feature = "file-logging")]
pub use file::{init_logging, LoggingGuard};

#[cfg(feature = "file-logging")]
mod file {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use chrono::Utc;
    use tracing_appender::rolling;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, Registry};

    use super::{cleanup_old_logs, RUN_PREFIX, RUN_TIMESTAMP_FORMAT};
    use crate::cli::CrateDebugFlags;

    /// Keeps the background log writers alive; logs flush on drop
    pub struct LoggingGuard {
        _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
        log_dir: PathBuf,
    }

    impl LoggingGuard {
        /// This run's log folder
        pub fn log_dir(&self) -> &Path {
            &self.log_dir
        }
    }

    /// Initialize console logging plus per-crate JSON log files
    ///
    /// ```text
    /// <log_dir>/
    ///   └── run_20250101_120000/
    ///       ├── neuroprobe-automation.log
    ///       ├── neuroprobe-link.log
    ///       └── combined.log
    /// ```
    ///
    /// Runs older than `retention_days`, and all but the newest
    /// `retention_runs`, are removed first.
    ///
    /// # Errors
    ///
    /// Fails if the run folder cannot be created, the filter does not parse,
    /// or a global subscriber is already set.
    pub fn init_logging(
        debug_flags: &CrateDebugFlags,
        default_level: &str,
        log_dir: &Path,
        retention_days: u64,
        retention_runs: usize,
    ) -> Result<LoggingGuard> {
        let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
        let run_folder = log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

        cleanup_old_logs(log_dir, retention_days, retention_runs)?;

        let filter = debug_flags.to_filter_string(default_level);
        let env_filter = EnvFilter::try_new(&filter).context("Invalid log filter")?;

        let mut layers = Vec::new();
        let mut file_guards = Vec::new();

        layers.push(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(env_filter)
                .boxed(),
        );

        for crate_name in crate::KNOWN_CRATES {
            let appender = rolling::never(&run_folder, format!("{}.log", crate_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guards.push(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_filter(EnvFilter::try_new(format!("{}=debug,off", crate_name))?)
                    .boxed(),
            );
        }

        let combined = rolling::never(&run_folder, "combined.log");
        let (writer, guard) = tracing_appender::non_blocking(combined);
        file_guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .json()
                .with_filter(EnvFilter::try_new(&filter)?)
                .boxed(),
        );

        Registry::default()
            .with(layers)
            .try_init()
            .context("Failed to install logger")?;

        Ok(LoggingGuard {
            _file_guards: file_guards,
            log_dir: run_folder,
        })
    }
}

/// Remove run folders past the retention policy
///
/// Folders whose names do not parse as `run_<timestamp>` are left alone.
///
/// # Errors
///
/// Fails only if `base_log_dir` exists but cannot be listed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<Vec<PathBuf>> {
    if !base_log_dir.exists() {
        return Ok(Vec::new());
    }
    let days = i64::try_from(retention_days.min(MAX_RETENTION_DAYS)).unwrap_or(0);
    let cutoff = Utc::now() - chrono::Duration::days(days);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)
        .with_context(|| format!("Failed to list {}", base_log_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
            .and_then(|ts| NaiveDateTime::parse_from_str(ts, RUN_TIMESTAMP_FORMAT).ok())
            .map(|naive| Utc.from_utc_datetime(&naive));
        if let Some(started) = started {
            runs.push((path, started));
        }
    }

    // Newest first; keep the first `retention_runs` that are inside the window
    runs.sort_by(|a, b| b.1.cmp(&a.1));
    let mut removed = Vec::new();
    for (index, (path, started)) in runs.into_iter().enumerate() {
        if index < retention_runs && started >= cutoff {
            continue;
        }
        match std::fs::remove_dir_all(&path) {
            Ok(()) => removed.push(path),
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_dir(base: &Path, started: DateTime<Utc>) -> PathBuf {
        let path = base.join(format!(
            "{}{}",
            RUN_PREFIX,
            started.format(RUN_TIMESTAMP_FORMAT)
        ));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_keeps_newest_runs() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let runs: Vec<PathBuf> = (0..5)
            .map(|i| run_dir(dir.path(), now - chrono::Duration::minutes(i)))
            .collect();

        let removed = cleanup_old_logs(dir.path(), 30, 3).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(runs[0].exists() && runs[1].exists() && runs[2].exists());
        assert!(!runs[3].exists() && !runs[4].exists());
    }

    #[test]
    fn test_removes_expired_runs() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let fresh = run_dir(dir.path(), now);
        let stale = run_dir(dir.path(), now - chrono::Duration::days(40));
        let unrelated = dir.path().join("calibration");
        std::fs::create_dir_all(&unrelated).unwrap();

        cleanup_old_logs(dir.path(), 30, 10).unwrap();

        assert!(fresh.exists());
        assert!(!stale.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_missing_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let removed = cleanup_old_logs(&dir.path().join("nope"), 30, 10).unwrap();
        assert!(removed.is_empty());
    }
}
