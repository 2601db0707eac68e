// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-device calibration record and device ↔ transformed conversion.
//!
//! Raw device readings are `[x, y, z, w]`. Four-axis devices drive depth on
//! `w`; three-axis devices have no separate depth axis and advance the probe
//! along `z`, which their transform already aligns with the shank.
//!
//! ```text
//! tip = (xyz − zero_xyz) + direction · (w − zero_w − brain_surface_offset)   4-axis
//! tip = (xyz − zero_xyz) − direction · brain_surface_offset                 3-axis
//! ```
//!
//! `direction` is the insertion direction in transformed space.

use neuroprobe_coordinates::{CoordinateError, CoordinateResult, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::DevicePosition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulatorLinkState {
    id: String,
    num_axes: u8,
    /// Travel range per axis, mm
    dimensions: DevicePosition,
    /// Device reading that corresponds to the transformed origin
    zero_coordinate_offset: DevicePosition,
    /// Shank distance between the calibrated tip and the brain surface
    brain_surface_offset: f64,
}

impl ManipulatorLinkState {
    /// # Errors
    ///
    /// Returns `CoordinateError::UnsupportedAxisCount` unless `num_axes` is 3 or 4.
    pub fn new(
        id: impl Into<String>,
        num_axes: u8,
        dimensions: DevicePosition,
    ) -> CoordinateResult<Self> {
        if !matches!(num_axes, 3 | 4) {
            return Err(CoordinateError::UnsupportedAxisCount(num_axes));
        }
        if dimensions.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(CoordinateError::InvalidDimensions(format!(
                "device travel must be strictly positive, got {:?}",
                dimensions
            )));
        }
        Ok(Self {
            id: id.into(),
            num_axes,
            dimensions,
            zero_coordinate_offset: [0.0; 4],
            brain_surface_offset: 0.0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn num_axes(&self) -> u8 {
        self.num_axes
    }

    pub fn dimensions(&self) -> DevicePosition {
        self.dimensions
    }

    pub fn zero_coordinate_offset(&self) -> DevicePosition {
        self.zero_coordinate_offset
    }

    pub fn set_zero_coordinate_offset(&mut self, offset: DevicePosition) {
        self.zero_coordinate_offset = offset;
    }

    pub fn brain_surface_offset(&self) -> f64 {
        self.brain_surface_offset
    }

    pub fn set_brain_surface_offset(&mut self, offset: f64) {
        self.brain_surface_offset = offset;
    }

    /// Index of the axis that `set_depth` drives
    pub fn depth_axis(&self) -> usize {
        if self.num_axes == 4 {
            3
        } else {
            2
        }
    }

    /// Raw depth-axis reading
    pub fn depth_reading(&self, position: &DevicePosition) -> f64 {
        position[self.depth_axis()]
    }

    /// Probe tip in transformed space for a raw device reading
    pub fn device_to_transformed(
        &self,
        position: &DevicePosition,
        direction: &Vector3<f64>,
    ) -> Vector3<f64> {
        let zero = &self.zero_coordinate_offset;
        let translation = Vector3::new(
            position[0] - zero[0],
            position[1] - zero[1],
            position[2] - zero[2],
        );
        let extension = if self.num_axes == 4 {
            position[3] - zero[3]
        } else {
            0.0
        };
        translation + direction * (extension - self.brain_surface_offset)
    }

    /// Raw device target that puts the tip at `tip` with the depth axis
    /// extended by `extension` mm (ignored on three-axis devices)
    pub fn transformed_to_device(
        &self,
        tip: &Vector3<f64>,
        direction: &Vector3<f64>,
        extension: f64,
    ) -> DevicePosition {
        let zero = &self.zero_coordinate_offset;
        if self.num_axes == 4 {
            let base = tip - direction * extension;
            [
                base.x + zero[0],
                base.y + zero[1],
                base.z + zero[2],
                extension + zero[3] + self.brain_surface_offset,
            ]
        } else {
            let base = tip + direction * self.brain_surface_offset;
            let z = base.z + zero[2];
            [base.x + zero[0], base.y + zero[1], z, z]
        }
    }

    /// First axis whose value leaves the travel range, with that value
    pub fn out_of_bounds_axis(&self, position: &DevicePosition) -> Option<(usize, f64)> {
        (0..usize::from(self.num_axes))
            .find(|axis| !self.axis_in_bounds(*axis, position[*axis]))
            .map(|axis| (axis, position[axis]))
    }

    pub fn depth_in_bounds(&self, depth: f64) -> bool {
        self.axis_in_bounds(self.depth_axis(), depth)
    }

    fn axis_in_bounds(&self, axis: usize, value: f64) -> bool {
        value.is_finite() && (0.0..=self.dimensions[axis]).contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() < 1e-9
    }

    fn state(num_axes: u8) -> ManipulatorLinkState {
        let mut state = ManipulatorLinkState::new("1", num_axes, [20.0; 4]).unwrap();
        state.set_zero_coordinate_offset([10.0, 10.0, 5.0, 8.0]);
        state.set_brain_surface_offset(0.4);
        state
    }

    #[test]
    fn test_rejects_two_axis_device() {
        assert!(matches!(
            ManipulatorLinkState::new("x", 2, [20.0; 4]),
            Err(CoordinateError::UnsupportedAxisCount(2))
        ));
    }

    #[test]
    fn test_four_axis_round_trip() {
        let state = state(4);
        let direction = Vector3::new(0.3, 0.0, 0.95).normalize();
        let tip = Vector3::new(-1.0, 0.5, 2.0);
        let device = state.transformed_to_device(&tip, &direction, 1.5);
        assert!((device[3] - (1.5 + 8.0 + 0.4)).abs() < 1e-12);
        assert!(close(&state.device_to_transformed(&device, &direction), &tip));
    }

    #[test]
    fn test_three_axis_round_trip() {
        let state = state(3);
        assert_eq!(state.depth_axis(), 2);
        let direction = Vector3::new(0.0, 0.0, 1.0);
        let tip = Vector3::new(1.0, 2.0, 3.0);
        let device = state.transformed_to_device(&tip, &direction, 99.0);
        assert!(close(&state.device_to_transformed(&device, &direction), &tip));
    }

    #[test]
    fn test_zero_offset_maps_to_origin() {
        let mut state = state(4);
        state.set_brain_surface_offset(0.0);
        let direction = Vector3::new(0.0, 0.0, 1.0);
        let tip = state.device_to_transformed(&state.zero_coordinate_offset(), &direction);
        assert!(close(&tip, &Vector3::zeros()));
    }

    #[test]
    fn test_bounds() {
        let state = state(4);
        assert_eq!(state.out_of_bounds_axis(&[1.0, 2.0, 3.0, 4.0]), None);
        assert_eq!(state.out_of_bounds_axis(&[1.0, 21.0, 3.0, -1.0]), Some((1, 21.0)));
        assert!(state.depth_in_bounds(20.0));
        assert!(!state.depth_in_bounds(f64::NAN));

        // Three-axis devices ignore w
        let three = ManipulatorLinkState::new("3", 3, [20.0; 4]).unwrap();
        assert_eq!(three.out_of_bounds_axis(&[1.0, 2.0, 3.0, 400.0]), None);
    }
}
