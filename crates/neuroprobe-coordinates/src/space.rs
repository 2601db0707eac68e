// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reference volume description and world ↔ atlas mappings.
//!
//! Atlas coordinates are `(AP, ML, DV)` in millimetres relative to the
//! reference origin (e.g. bregma), DV positive ventral. World coordinates are
//! `(x = right, y = up, z = forward)` with the volume centred on the world
//! origin.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{CoordinateError, CoordinateResult};

/// Immutable cuboid reference volume.
///
/// Constructed once per active atlas configuration and shared behind an
/// `Arc`. Switching atlases replaces the value wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSpace {
    name: String,
    /// Volume extent along (AP, ML, DV), mm
    dimensions: Vector3<f64>,
    /// Millimetres per label-grid step along (AP, ML, DV)
    resolution: Vector3<f64>,
    /// Anchor point measured from the volume corner, mm
    reference_origin: Vector3<f64>,
}

impl CoordinateSpace {
    /// Create a new coordinate space
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension or resolution component is not finite
    /// and strictly positive, or if the reference origin is not finite.
    pub fn new(
        name: impl Into<String>,
        dimensions: Vector3<f64>,
        resolution: Vector3<f64>,
        reference_origin: Vector3<f64>,
    ) -> CoordinateResult<Self> {
        if dimensions.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(CoordinateError::InvalidDimensions(format!(
                "dimensions must be strictly positive, got {:?}",
                dimensions.as_slice()
            )));
        }
        if resolution.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(CoordinateError::InvalidResolution(format!(
                "resolution must be strictly positive, got {:?}",
                resolution.as_slice()
            )));
        }
        if reference_origin.iter().any(|o| !o.is_finite()) {
            return Err(CoordinateError::NonFinite(format!(
                "reference origin {:?}",
                reference_origin.as_slice()
            )));
        }

        Ok(Self {
            name: name.into(),
            dimensions,
            resolution,
            reference_origin,
        })
    }

    /// Allen mouse CCF at 25 µm with bregma as the reference origin
    pub fn mouse_ccf() -> Self {
        Self {
            name: "ccf25".to_string(),
            dimensions: Vector3::new(13.2, 11.4, 8.0),
            resolution: Vector3::new(0.025, 0.025, 0.025),
            reference_origin: Vector3::new(5.4, 5.739, 0.332),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> Vector3<f64> {
        self.dimensions
    }

    pub fn resolution(&self) -> Vector3<f64> {
        self.resolution
    }

    pub fn reference_origin(&self) -> Vector3<f64> {
        self.reference_origin
    }

    /// Volume centre expressed in atlas coordinates
    pub fn center(&self) -> Vector3<f64> {
        self.dimensions / 2.0 - self.reference_origin
    }

    /// Number of label-grid steps along each axis
    pub fn index_dimensions(&self) -> Vector3<f64> {
        self.dimensions.component_div(&self.resolution)
    }

    pub fn space_to_world(&self, point: &Vector3<f64>) -> Vector3<f64> {
        atlas_axes_to_world(&(point - self.center()))
    }

    pub fn world_to_space(&self, point: &Vector3<f64>) -> Vector3<f64> {
        world_axes_to_atlas(point) + self.center()
    }

    pub fn space_to_world_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        atlas_axes_to_world(vector)
    }

    pub fn world_to_space_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        world_axes_to_atlas(vector)
    }

    /// Atlas coordinate to fractional label-grid index
    pub fn space_to_index(&self, point: &Vector3<f64>) -> Vector3<f64> {
        (point + self.reference_origin).component_div(&self.resolution)
    }

    /// Fractional label-grid index to atlas coordinate
    pub fn index_to_space(&self, index: &Vector3<f64>) -> Vector3<f64> {
        index.component_mul(&self.resolution) - self.reference_origin
    }

    /// True if an atlas coordinate lies inside the volume bounds
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        let corner_relative = point + self.reference_origin;
        corner_relative
            .iter()
            .zip(self.dimensions.iter())
            .all(|(p, d)| *p >= 0.0 && p <= d)
    }
}

/// (AP, ML, DV) → (x = ML, y = −DV, z = AP)
fn atlas_axes_to_world(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.y, -v.z, v.x)
}

/// (x, y, z) → (AP = z, ML = x, DV = −y)
fn world_axes_to_atlas(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.z, v.x, -v.y)
}
