// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neuroprobe State Manager
//!
//! Insertion automation state for one probe/manipulator pairing.
//!
//! ## Cycle
//!
//! ```text
//! IsUncalibrated ─► IsCalibrated ─► DrivingToTargetEntryCoordinate ─► AtEntryCoordinate
//!                                                                        │
//!   ┌────────────────────────────────────────────────────────────────────┘
//!   ▼
//! AtDuraInsert ─► DrivingToNearTarget ─► AtNearTargetInsert ─► DrivingToPastTarget
//!   ─► AtPastTarget ─► ReturningToTarget ─► AtTarget ─► ExitingToNearTarget
//!   ─► AtNearTargetExit ─► ExitingToDura ─► AtDuraExit ─► ExitingToMargin
//!   ─► AtExitMargin ─► ExitingToTargetEntryCoordinate ─► AtEntryCoordinate
//! ```
//!
//! Every guarded transition either succeeds or returns
//! [`StateError::InvalidTransition`]; nothing is clamped or silently ignored.
//!
//! ## Usage
//!
//! ```rust
//! use neuroprobe_state_manager::{AutomationState, AutomationStateManager};
//!
//! let mut manager = AutomationStateManager::new();
//! manager.set_calibrated();
//! manager.set_driving_to_target_entry_coordinate()?;
//! manager.set_at_entry_coordinate()?;
//! manager.set_at_dura_insert()?;
//! assert!(manager.is_insertable());
//! assert_eq!(manager.state(), AutomationState::AtDuraInsert);
//! # Ok::<(), neuroprobe_state_manager::StateError>(())
//! ```

pub mod automation_state;
pub mod events;

pub use automation_state::{AutomationState, AutomationStateManager};
pub use events::{EventReceiver, EventSender, StateEvent};

use thiserror::Error;

/// State manager error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The requested transition is not legal from the current state
    #[error("Invalid transition: cannot {requested} from {from}")]
    InvalidTransition {
        from: AutomationState,
        requested: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;
