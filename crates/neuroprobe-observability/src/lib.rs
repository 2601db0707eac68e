// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neuroprobe-observability
//!
//! Logging setup shared by every neuroprobe binary, with per-crate debug
//! flag support.
//!
//! ## Features
//! - `file-logging`: Per-run JSON log files with retention cleanup

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known neuroprobe crate names for debug flags and per-crate log files
///
/// These are also the `target:` names the crates log under.
pub const KNOWN_CRATES: &[&str] = &[
    "neuroprobe-coordinates",
    "neuroprobe-state-manager",
    "neuroprobe-link",
    "neuroprobe-automation",
];
