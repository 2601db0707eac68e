// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Drive layer error types.

use neuroprobe_coordinates::CoordinateError;
use neuroprobe_link::LinkError;
use neuroprobe_state_manager::StateError;
use thiserror::Error;

/// Why a drive (or a drive-related request) did not complete
///
/// A user stop is not an error; see [`crate::DriveOutcome::Stopped`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriveError {
    /// Invalid speeds, distances or geometry
    #[error("Configuration error: {0}")]
    Config(String),

    /// The insertion cycle does not allow this request now
    #[error(transparent)]
    State(#[from] StateError),

    /// The link failed; the drive was aborted without retry
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A computed target lies outside the device's travel
    #[error("Target outside travel of '{device_id}': axis {axis} = {value:.4} mm")]
    OutOfBounds {
        device_id: String,
        axis: usize,
        value: f64,
    },

    /// The insertion path never enters the brain volume
    #[error("No brain surface found along the insertion path")]
    SurfaceNotFound,

    /// No device with this id was registered with the session
    #[error("Device '{0}' is not registered")]
    NotRegistered(String),
}

impl From<CoordinateError> for DriveError {
    fn from(err: CoordinateError) -> Self {
        DriveError::Config(err.to_string())
    }
}

/// Result type for drive operations
pub type DriveResult<T> = Result<T, DriveError>;
