// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neuroprobe-coordinates
//!
//! Coordinate pipeline for probe placement in a reference brain volume.
//!
//! ## Frames
//!
//! ```text
//! device ──► transformed (APMLDV, per insertion) ──► atlas space ──► world
//!        ◄──                                     ◄──             ◄──
//! ```
//!
//! - [`CoordinateSpace`]: world ↔ atlas mapping plus the label-grid index space
//! - [`CoordinateTransform`]: atlas ↔ transformed mapping (identity, affine,
//!   four-axis and three-axis manipulator variants)
//! - [`Insertion`]: one probe placement, composing the two above
//! - [`SurfaceFinder`]: coarse/fine ray march for the brain entry coordinate
//!
//! Point conversions apply rotation/relabeling and translation; vector
//! conversions apply rotation/relabeling only. Use the vector variants for
//! deltas and directions.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use nalgebra::Vector3;
//! use neuroprobe_coordinates::{CoordinateSpace, CoordinateTransform, Insertion, InsertionAngles};
//!
//! let space = Arc::new(CoordinateSpace::mouse_ccf());
//! let transform = Arc::new(CoordinateTransform::identity());
//! let insertion = Insertion::new(
//!     Vector3::new(-2.0, 1.0, 3.0),
//!     InsertionAngles::new(90.0, 45.0, 0.0),
//!     space,
//!     transform,
//! );
//! let world = insertion.position_world();
//! let back = insertion.world_to_transformed(&world);
//! assert!((back - insertion.position_apmldv()).norm() < 1e-9);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod insertion;
pub mod space;
pub mod surface;
pub mod transform;

pub use error::{CoordinateError, CoordinateResult};
pub use insertion::{Insertion, InsertionAngles};
pub use space::CoordinateSpace;
pub use surface::{
    is_not_found, not_found_sentinel, DenseLabelVolume, LabelVolume, SurfaceFinder, SurfaceHit,
    DEFAULT_MAX_SEARCH_DOUBLINGS,
};
pub use transform::{CoordinateTransform, Handedness, TransformKind};

/// Re-export so downstream crates agree on the vector type
pub use nalgebra::Vector3;
