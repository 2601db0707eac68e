// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Manipulator link error types.

Transport-agnostic: a serial, HTTP or socket adapter maps its own failures
onto these variants before handing them to the drive layer.
*/

use thiserror::Error;

/// Link layer errors (transport-agnostic)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// The link server or device bus did not answer
    #[error("Link unreachable: {0}")]
    Unreachable(String),

    /// No device with this id is attached
    #[error("Unknown device: '{0}'")]
    UnknownDevice(String),

    /// The device refused a move command
    #[error("Write rejected by '{id}': {reason}")]
    WriteRejected { id: String, reason: String },

    /// A move was issued without holding the write gate
    #[error("Device '{0}' is not writable")]
    NotWritable(String),

    /// Device reported a hardware fault
    #[error("Hardware fault on '{id}': {message}")]
    Hardware { id: String, message: String },

    /// The move was halted by a stop request
    #[error("Movement of '{0}' was stopped")]
    Stopped(String),
}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;
