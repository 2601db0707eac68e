// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Volumetric surface finder.
//!
//! Marches from a point above the brain down to a bottom point and returns
//! the coordinate where the label volume turns from outside (label ≤ 0) to
//! inside (label > 0). Assumes the path crosses the boundary once.
//!
//! Coordinates are label-grid indices; callers convert beforehand (see
//! [`crate::CoordinateSpace::space_to_index`]).

use nalgebra::Vector3;
use tracing::debug;

use crate::error::{CoordinateError, CoordinateResult};

/// Coarse pass resolution, steps per segment (1 %)
const COARSE_STEPS: u32 = 100;

/// Fine pass steps per coarse step (0.1 %)
const FINE_STEPS_PER_COARSE: u32 = 10;

/// Default bound on how often the search distance may double
pub const DEFAULT_MAX_SEARCH_DOUBLINGS: u32 = 8;

/// Label lookup over the active reference volume
pub trait LabelVolume {
    /// Region label at a fractional grid index; ≤ 0 is outside the brain
    fn label_at(&self, index: &Vector3<f64>) -> i32;

    /// Grid extent along each axis
    fn index_dimensions(&self) -> Vector3<f64>;
}

/// Surface search result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceHit {
    Found(Vector3<f64>),
    /// The segment never entered the volume
    NotFound,
}

impl SurfaceHit {
    pub fn is_found(&self) -> bool {
        matches!(self, SurfaceHit::Found(_))
    }

    pub fn coordinate(&self) -> Option<Vector3<f64>> {
        match self {
            SurfaceHit::Found(coordinate) => Some(*coordinate),
            SurfaceHit::NotFound => None,
        }
    }

    /// Flatten to the raw form where "not found" is the all-NaN sentinel
    pub fn into_coordinate(self) -> Vector3<f64> {
        self.coordinate().unwrap_or_else(not_found_sentinel)
    }
}

/// All-NaN coordinate signalling that no entry point exists
pub fn not_found_sentinel() -> Vector3<f64> {
    Vector3::from_element(f64::NAN)
}

/// True for the not-found sentinel (any NaN component)
pub fn is_not_found(coordinate: &Vector3<f64>) -> bool {
    coordinate.iter().any(|c| c.is_nan())
}

#[derive(Debug, Clone)]
pub struct SurfaceFinder {
    max_search_doublings: u32,
}

impl Default for SurfaceFinder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEARCH_DOUBLINGS)
    }
}

impl SurfaceFinder {
    pub fn new(max_search_doublings: u32) -> Self {
        Self {
            max_search_doublings,
        }
    }

    /// Find the entry coordinate above `bottom` along `direction`
    ///
    /// # Errors
    ///
    /// Returns `CoordinateError::ZeroDirection` if `direction` has no length.
    pub fn find_entry<V: LabelVolume + ?Sized>(
        &self,
        volume: &V,
        bottom: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> CoordinateResult<SurfaceHit> {
        let direction = direction
            .try_normalize(f64::EPSILON)
            .ok_or(CoordinateError::ZeroDirection)?;

        let mut search_distance = extent_along(&volume.index_dimensions(), &direction);
        let mut top = bottom - direction * search_distance;

        let mut doublings = 0;
        while volume.label_at(&top) > 0 {
            if doublings == self.max_search_doublings {
                debug!(
                    target: "neuroprobe-coordinates",
                    "Search top still inside after {} doublings", doublings
                );
                return Ok(SurfaceHit::NotFound);
            }
            search_distance *= 2.0;
            top = bottom - direction * search_distance;
            doublings += 1;
        }

        let lerp = |t: f64| top + (bottom - top) * t;

        let Some(coarse) =
            (0..=COARSE_STEPS).find(|step| volume.label_at(&lerp(coarse_fraction(*step))) > 0)
        else {
            return Ok(SurfaceHit::NotFound);
        };

        let fine_start = coarse * FINE_STEPS_PER_COARSE;
        for fine in (0..=fine_start).rev() {
            let candidate = lerp(fine_fraction(fine));
            if volume.label_at(&candidate) <= 0 {
                debug!(
                    target: "neuroprobe-coordinates",
                    "Surface found at {:?} (coarse step {}, fine step {})",
                    candidate.as_slice(),
                    coarse,
                    fine
                );
                return Ok(SurfaceHit::Found(candidate));
            }
        }

        // Unreachable while the top point is outside; keep the sentinel anyway
        Ok(SurfaceHit::NotFound)
    }

    /// Same as [`Self::find_entry`] but returns the NaN sentinel on a miss
    pub fn find_entry_coordinate<V: LabelVolume + ?Sized>(
        &self,
        volume: &V,
        bottom: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> CoordinateResult<Vector3<f64>> {
        Ok(self.find_entry(volume, bottom, direction)?.into_coordinate())
    }
}

fn coarse_fraction(step: u32) -> f64 {
    f64::from(step) / f64::from(COARSE_STEPS)
}

fn fine_fraction(step: u32) -> f64 {
    f64::from(step) / f64::from(COARSE_STEPS * FINE_STEPS_PER_COARSE)
}

/// Distance along `direction` that spans the volume on its dominant axis
fn extent_along(dimensions: &Vector3<f64>, direction: &Vector3<f64>) -> f64 {
    let axis = direction.iamax();
    dimensions[axis] / direction[axis].abs()
}

/// Dense label grid stored x-fastest
#[derive(Debug, Clone)]
pub struct DenseLabelVolume {
    dimensions: [usize; 3],
    labels: Vec<i32>,
}

impl DenseLabelVolume {
    /// Build a grid by evaluating `label` at every voxel
    pub fn from_fn(dimensions: [usize; 3], mut label: impl FnMut(usize, usize, usize) -> i32) -> Self {
        let [nx, ny, nz] = dimensions;
        let mut labels = Vec::with_capacity(nx * ny * nz);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    labels.push(label(x, y, z));
                }
            }
        }
        Self { dimensions, labels }
    }

    /// Build a grid from an x-fastest label buffer
    ///
    /// # Errors
    ///
    /// Returns `CoordinateError::InvalidDimensions` when the buffer length does
    /// not match the dimensions.
    pub fn from_labels(dimensions: [usize; 3], labels: Vec<i32>) -> CoordinateResult<Self> {
        let expected = dimensions.iter().product::<usize>();
        if expected == 0 || labels.len() != expected {
            return Err(CoordinateError::InvalidDimensions(format!(
                "label buffer of {} entries does not match grid {:?}",
                labels.len(),
                dimensions
            )));
        }
        Ok(Self { dimensions, labels })
    }

    fn voxel(&self, index: &Vector3<f64>) -> Option<usize> {
        let mut voxel = [0usize; 3];
        for axis in 0..3 {
            let rounded = index[axis].round();
            if !rounded.is_finite() || rounded < 0.0 || rounded >= self.dimensions[axis] as f64 {
                return None;
            }
            voxel[axis] = rounded as usize;
        }
        let [nx, ny, _] = self.dimensions;
        Some(voxel[0] + nx * (voxel[1] + ny * voxel[2]))
    }
}

impl LabelVolume for DenseLabelVolume {
    fn label_at(&self, index: &Vector3<f64>) -> i32 {
        self.voxel(index).map_or(0, |i| self.labels[i])
    }

    fn index_dimensions(&self) -> Vector3<f64> {
        Vector3::new(
            self.dimensions[0] as f64,
            self.dimensions[1] as f64,
            self.dimensions[2] as f64,
        )
    }
}
