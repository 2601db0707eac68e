// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Probe insertion entity.
//!
//! An insertion stores its tip position in transformed (APMLDV) space plus
//! the probe angles, and composes its transform and space for conversions:
//!
//! ```text
//! transformed ──transform──► atlas ──space──► world
//! ```

use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::space::CoordinateSpace;
use crate::transform::CoordinateTransform;

/// Probe orientation in degrees
///
/// Yaw turns about DV (0 = facing anterior), pitch tilts away from vertical
/// (0 = straight down), roll spins about the probe shank.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InsertionAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl InsertionAngles {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Unit insertion direction (toward the tip) in atlas space
    pub fn direction(&self) -> Vector3<f64> {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        Vector3::new(
            pitch.sin() * yaw.cos(),
            pitch.sin() * yaw.sin(),
            pitch.cos(),
        )
    }
}

/// One probe placement
#[derive(Debug, Clone)]
pub struct Insertion {
    position_apmldv: Vector3<f64>,
    angles: InsertionAngles,
    space: Arc<CoordinateSpace>,
    transform: Arc<CoordinateTransform>,
}

impl Insertion {
    pub fn new(
        position_apmldv: Vector3<f64>,
        angles: InsertionAngles,
        space: Arc<CoordinateSpace>,
        transform: Arc<CoordinateTransform>,
    ) -> Self {
        Self {
            position_apmldv,
            angles,
            space,
            transform,
        }
    }

    pub fn position_apmldv(&self) -> Vector3<f64> {
        self.position_apmldv
    }

    pub fn set_position_apmldv(&mut self, position: Vector3<f64>) {
        self.position_apmldv = position;
    }

    /// Move the tip by a transformed-space delta
    pub fn translate(&mut self, delta: &Vector3<f64>) {
        self.position_apmldv += delta;
    }

    pub fn angles(&self) -> InsertionAngles {
        self.angles
    }

    pub fn set_angles(&mut self, angles: InsertionAngles) {
        self.angles = angles;
    }

    pub fn space(&self) -> &Arc<CoordinateSpace> {
        &self.space
    }

    pub fn transform(&self) -> &Arc<CoordinateTransform> {
        &self.transform
    }

    /// Swap the active reference volume; the tip keeps its world position
    pub fn set_coordinate_space(&mut self, space: Arc<CoordinateSpace>) {
        let world = self.position_world();
        self.space = space;
        self.position_apmldv = self.world_to_transformed(&world);
    }

    /// Swap the active transform; the tip keeps its world position
    pub fn set_coordinate_transform(&mut self, transform: Arc<CoordinateTransform>) {
        let world = self.position_world();
        self.transform = transform;
        self.position_apmldv = self.world_to_transformed(&world);
    }

    /// Tip in atlas coordinates
    pub fn position_space(&self) -> Vector3<f64> {
        self.transform.transformed_to_space(&self.position_apmldv)
    }

    /// Tip in world coordinates
    pub fn position_world(&self) -> Vector3<f64> {
        self.transformed_to_world(&self.position_apmldv)
    }

    pub fn set_position_world(&mut self, world: &Vector3<f64>) {
        self.position_apmldv = self.world_to_transformed(world);
    }

    pub fn world_to_transformed(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.transform
            .space_to_transformed(&self.space.world_to_space(world))
    }

    pub fn transformed_to_world(&self, transformed: &Vector3<f64>) -> Vector3<f64> {
        self.space
            .space_to_world(&self.transform.transformed_to_space(transformed))
    }

    pub fn world_to_transformed_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.transform
            .space_to_transformed_vector(&self.space.world_to_space_vector(world))
    }

    pub fn transformed_to_world_vector(&self, transformed: &Vector3<f64>) -> Vector3<f64> {
        self.space
            .space_to_world_vector(&self.transform.transformed_to_space_vector(transformed))
    }

    /// Insertion direction in atlas space
    pub fn direction_space(&self) -> Vector3<f64> {
        self.angles.direction()
    }

    /// Insertion direction in world space
    pub fn direction_world(&self) -> Vector3<f64> {
        self.space.space_to_world_vector(&self.angles.direction())
    }

    /// Insertion direction in transformed space (not normalised under scaling)
    pub fn direction_transformed(&self) -> Vector3<f64> {
        self.transform
            .space_to_transformed_vector(&self.angles.direction())
    }

    /// Point `depth` mm further along the shank than the tip, transformed space
    pub fn along_shank(&self, depth: f64) -> Vector3<f64> {
        self.position_apmldv + self.direction_transformed() * depth
    }

    /// Tip position in label-grid index space
    pub fn position_index(&self) -> Vector3<f64> {
        self.space.space_to_index(&self.position_space())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Handedness;

    fn assert_close(a: &Vector3<f64>, b: &Vector3<f64>) {
        assert!((a - b).norm() < 1e-9, "{:?} != {:?}", a, b);
    }

    fn insertion(transform: CoordinateTransform) -> Insertion {
        Insertion::new(
            Vector3::new(-1.5, 0.8, 2.5),
            InsertionAngles::new(90.0, 20.0, 0.0),
            Arc::new(CoordinateSpace::mouse_ccf()),
            Arc::new(transform),
        )
    }

    #[test]
    fn test_vertical_probe_points_down() {
        let angles = InsertionAngles::new(0.0, 0.0, 0.0);
        assert_close(&angles.direction(), &Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_world_round_trip() {
        let insertion = insertion(CoordinateTransform::four_axis(Handedness::Right, 90.0));
        let world = insertion.position_world();
        assert_close(&insertion.world_to_transformed(&world), &insertion.position_apmldv());
    }

    #[test]
    fn test_swapping_transform_keeps_world_position() {
        let mut insertion = insertion(CoordinateTransform::identity());
        let world = insertion.position_world();
        insertion.set_coordinate_transform(Arc::new(CoordinateTransform::three_axis(
            Handedness::Left,
            45.0,
            10.0,
        )));
        assert_close(&insertion.position_world(), &world);
    }

    #[test]
    fn test_along_shank_moves_in_direction() {
        let insertion = insertion(CoordinateTransform::identity());
        let deeper = insertion.along_shank(1.0);
        assert_close(
            &(insertion.transform().transformed_to_space(&deeper) - insertion.position_space()),
            &insertion.direction_space(),
        );
    }

    #[test]
    fn test_translate_uses_vector_semantics() {
        let mut insertion = insertion(CoordinateTransform::identity());
        let before = insertion.position_apmldv();
        insertion.translate(&Vector3::new(0.0, 0.0, 0.5));
        assert_close(&(insertion.position_apmldv() - before), &Vector3::new(0.0, 0.0, 0.5));
    }
}
