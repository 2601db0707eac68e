// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neuroprobe - Robotic electrode probe insertion
//!
//! Places a recording probe at a target inside a reference brain volume and
//! drives a physical manipulator through a staged insertion.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! neuroprobe = "0.1"
//! ```
//!
//! ## Feature Flags
//!
//! - **`file-logging`** (default): Per-run JSON log files via `neuroprobe-observability`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neuroprobe::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = neuroprobe::config::load_config(None, None)?;
//! neuroprobe::config::validate_config(&config)?;
//!
//! let link = SimulatedManipulatorLink::new(neuroprobe::setup::simulator_config(&config.manipulator))
//!     .with_device("1", [10.0; 4]);
//! let session = Arc::new(ManipulatorSession::new(Arc::new(link)));
//! session.connect().await?;
//!
//! let speeds = neuroprobe::setup::speed_profile(&config.automation);
//! let mut orchestrator = DriveOrchestrator::new("1", session, speeds)?
//!     .with_write_priority(config.automation.write_priority);
//! orchestrator.calibrate_zero().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: neuroprobe-config, neuroprobe-observability │
//! │  (TOML + overrides, logging setup)                      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Core: neuroprobe-coordinates, neuroprobe-state-manager │
//! │  (Frames, surface search, insertion cycle)              │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Device: neuroprobe-link                                │
//! │  (ManipulatorLink trait, offsets, simulator)            │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Automation: neuroprobe-automation                      │
//! │  (Drive orchestrator, position echo, output log)        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use neuroprobe_automation as automation;
pub use neuroprobe_config as config;
pub use neuroprobe_coordinates as coordinates;
pub use neuroprobe_link as link;
pub use neuroprobe_observability as observability;
pub use neuroprobe_state_manager as state_manager;

pub mod setup;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::automation::{
        plan_entry, DriveError, DriveOrchestrator, DriveOutcome, InsertionPlan,
        ManipulatorSession, OutputLog, PositionEcho, SpeedProfile, StopHandle,
    };
    pub use crate::coordinates::{
        CoordinateSpace, CoordinateTransform, Insertion, InsertionAngles, LabelVolume,
        SurfaceFinder, Vector3,
    };
    pub use crate::link::{ManipulatorLink, SimulatedManipulatorLink};
    pub use crate::state_manager::{AutomationState, StateEvent};
}
