// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Coordinate pipeline error types.
//!
//! Every variant is a configuration error: a caller handed the pipeline a
//! value it cannot represent. "Surface not found" is deliberately absent, it
//! is a regular outcome (see [`crate::SurfaceHit`]).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    /// Volume dimensions must be finite and strictly positive
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Label-grid resolution must be finite and strictly positive
    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    /// Affine scale factors must be finite and non-zero
    #[error("Invalid scale: {0}")]
    InvalidScale(String),

    /// Manipulators have either 3 or 4 axes
    #[error("Unsupported axis count: {0} (expected 3 or 4)")]
    UnsupportedAxisCount(u8),

    /// The linear part of a transform could not be inverted
    #[error("Singular transform: {0}")]
    SingularTransform(String),

    /// Search directions must have a non-zero length
    #[error("Direction vector has zero length")]
    ZeroDirection,

    #[error("Non-finite value: {0}")]
    NonFinite(String),
}

/// Result type for coordinate operations
pub type CoordinateResult<T> = Result<T, CoordinateError>;
