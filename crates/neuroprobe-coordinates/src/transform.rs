// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Atlas ↔ transformed space mappings.
//!
//! A transform is a linear map `A` plus an optional origin `o` expressed in
//! atlas space:
//!
//! ```text
//! space       = A · transformed + o      (point)
//! transformed = A⁻¹ · (space − o)        (point)
//! space       = A · transformed          (vector)
//! ```
//!
//! `A` and `A⁻¹` are computed once at construction; changing handedness or
//! angles means building a new transform.
//!
//! Rotations use the atlas axes (AP, ML, DV): yaw turns about DV, pitch tilts
//! about ML, roll spins about AP. Angles are given in degrees.

use std::fmt;

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{CoordinateError, CoordinateResult};

/// Manipulator mounting handedness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Right,
    Left,
}

impl Handedness {
    /// Sign applied to the device's lateral axis
    pub fn sign(self) -> f64 {
        match self {
            Handedness::Right => 1.0,
            Handedness::Left => -1.0,
        }
    }

    fn tag(self) -> char {
        match self {
            Handedness::Right => 'R',
            Handedness::Left => 'L',
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Right => write!(f, "right"),
            Handedness::Left => write!(f, "left"),
        }
    }
}

/// Transform variant and the parameters captured at construction
#[derive(Debug, Clone, PartialEq)]
pub enum TransformKind {
    /// Transformed space is atlas space
    Identity,
    /// Per-axis scaling followed by a rotation (e.g. stereotaxic atlas fits)
    Affine {
        scale: Vector3<f64>,
        yaw: f64,
        pitch: f64,
        roll: f64,
    },
    /// Four-axis manipulator: lateral sign flip then yaw; depth is a separate axis
    FourAxis { handedness: Handedness, yaw: f64 },
    /// Three-axis manipulator mounted along the probe; depth is folded into z
    ThreeAxis {
        handedness: Handedness,
        yaw: f64,
        pitch: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateTransform {
    prefix: String,
    name: String,
    kind: TransformKind,
    to_space: Matrix3<f64>,
    to_transformed: Matrix3<f64>,
    origin: Vector3<f64>,
}

impl CoordinateTransform {
    fn from_linear(
        prefix: String,
        name: String,
        kind: TransformKind,
        to_space: Matrix3<f64>,
    ) -> CoordinateResult<Self> {
        let to_transformed = to_space
            .try_inverse()
            .ok_or_else(|| CoordinateError::SingularTransform(name.clone()))?;
        Ok(Self {
            prefix,
            name,
            kind,
            to_space,
            to_transformed,
            origin: Vector3::zeros(),
        })
    }

    /// Transformed space equals atlas space
    pub fn identity() -> Self {
        Self {
            prefix: "atlas".to_string(),
            name: "Atlas".to_string(),
            kind: TransformKind::Identity,
            to_space: Matrix3::identity(),
            to_transformed: Matrix3::identity(),
            origin: Vector3::zeros(),
        }
    }

    /// Scale then rotate (space → transformed)
    ///
    /// # Errors
    ///
    /// Returns `CoordinateError::InvalidScale` if any scale factor is zero or
    /// not finite.
    pub fn affine(
        prefix: impl Into<String>,
        scale: Vector3<f64>,
        yaw: f64,
        pitch: f64,
        roll: f64,
    ) -> CoordinateResult<Self> {
        if scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(CoordinateError::InvalidScale(format!(
                "scale factors must be finite and non-zero, got {:?}",
                scale.as_slice()
            )));
        }
        let prefix = prefix.into();
        let rotation = rotation(yaw, pitch, roll);
        // transformed = R · S · space, so space = S⁻¹ · Rᵀ · transformed
        let to_space = Matrix3::from_diagonal(&scale.map(|s| 1.0 / s)) * rotation.transpose();
        Self::from_linear(
            prefix.clone(),
            format!("Affine ({prefix})"),
            TransformKind::Affine {
                scale,
                yaw,
                pitch,
                roll,
            },
            to_space,
        )
    }

    /// Four-axis manipulator transform
    pub fn four_axis(handedness: Handedness, yaw: f64) -> Self {
        let to_space = rotation(yaw, 0.0, 0.0) * lateral_flip(handedness);
        Self {
            prefix: format!("4{}", handedness.tag()),
            name: format!("Four Axis {} Handed Manipulator", capitalise(handedness)),
            kind: TransformKind::FourAxis { handedness, yaw },
            to_transformed: to_space.transpose(),
            to_space,
            origin: Vector3::zeros(),
        }
    }

    /// Three-axis manipulator transform (device z runs along the probe)
    pub fn three_axis(handedness: Handedness, yaw: f64, pitch: f64) -> Self {
        let to_space = rotation(yaw, pitch, 0.0) * lateral_flip(handedness);
        Self {
            prefix: format!("3{}", handedness.tag()),
            name: format!("Three Axis {} Handed Manipulator", capitalise(handedness)),
            kind: TransformKind::ThreeAxis {
                handedness,
                yaw,
                pitch,
            },
            to_transformed: to_space.transpose(),
            to_space,
            origin: Vector3::zeros(),
        }
    }

    /// Select the manipulator variant for a device's axis count
    ///
    /// # Errors
    ///
    /// Returns `CoordinateError::UnsupportedAxisCount` for anything but 3 or 4.
    pub fn manipulator(
        num_axes: u8,
        handedness: Handedness,
        yaw: f64,
        pitch: f64,
    ) -> CoordinateResult<Self> {
        match num_axes {
            4 => Ok(Self::four_axis(handedness, yaw)),
            3 => Ok(Self::three_axis(handedness, yaw, pitch)),
            other => Err(CoordinateError::UnsupportedAxisCount(other)),
        }
    }

    /// Place the transformed origin at an atlas coordinate
    pub fn with_origin(mut self, origin: Vector3<f64>) -> Self {
        self.origin = origin;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TransformKind {
        &self.kind
    }

    pub fn origin(&self) -> Vector3<f64> {
        self.origin
    }

    pub fn yaw(&self) -> f64 {
        match self.kind {
            TransformKind::Identity => 0.0,
            TransformKind::Affine { yaw, .. }
            | TransformKind::FourAxis { yaw, .. }
            | TransformKind::ThreeAxis { yaw, .. } => yaw,
        }
    }

    pub fn pitch(&self) -> f64 {
        match self.kind {
            TransformKind::Affine { pitch, .. } | TransformKind::ThreeAxis { pitch, .. } => pitch,
            _ => 0.0,
        }
    }

    pub fn handedness(&self) -> Option<Handedness> {
        match self.kind {
            TransformKind::FourAxis { handedness, .. }
            | TransformKind::ThreeAxis { handedness, .. } => Some(handedness),
            _ => None,
        }
    }

    /// True when depth moves are expressed through the three translation axes
    pub fn folds_depth(&self) -> bool {
        matches!(self.kind, TransformKind::ThreeAxis { .. })
    }

    pub fn transformed_to_space(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.to_space * point + self.origin
    }

    pub fn space_to_transformed(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.to_transformed * (point - self.origin)
    }

    pub fn transformed_to_space_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.to_space * vector
    }

    pub fn space_to_transformed_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.to_transformed * vector
    }
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// R = Rz(yaw) · Ry(pitch) · Rx(roll), angles in degrees
fn rotation(yaw: f64, pitch: f64, roll: f64) -> Matrix3<f64> {
    Rotation3::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
        .into_inner()
}

fn lateral_flip(handedness: Handedness) -> Matrix3<f64> {
    Matrix3::from_diagonal(&Vector3::new(1.0, handedness.sign(), 1.0))
}

fn capitalise(handedness: Handedness) -> &'static str {
    match handedness {
        Handedness::Right => "Right",
        Handedness::Left => "Left",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &Vector3<f64>, b: &Vector3<f64>) {
        assert!((a - b).norm() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(CoordinateTransform::identity().prefix(), "atlas");
        assert_eq!(CoordinateTransform::four_axis(Handedness::Right, 0.0).prefix(), "4R");
        assert_eq!(CoordinateTransform::four_axis(Handedness::Left, 0.0).prefix(), "4L");
        assert_eq!(
            CoordinateTransform::three_axis(Handedness::Left, 0.0, 30.0).prefix(),
            "3L"
        );
    }

    #[test]
    fn test_manipulator_rejects_bad_axis_count() {
        let result = CoordinateTransform::manipulator(5, Handedness::Right, 0.0, 0.0);
        assert_eq!(result, Err(CoordinateError::UnsupportedAxisCount(5)));
    }

    #[test]
    fn test_affine_rejects_zero_scale() {
        let result =
            CoordinateTransform::affine("bad", Vector3::new(1.0, 0.0, 1.0), 0.0, 0.0, 0.0);
        assert!(matches!(result, Err(CoordinateError::InvalidScale(_))));
    }

    #[test]
    fn test_handedness_flips_lateral_axis() {
        let right = CoordinateTransform::four_axis(Handedness::Right, 0.0);
        let left = CoordinateTransform::four_axis(Handedness::Left, 0.0);
        let lateral = Vector3::new(0.0, 1.0, 0.0);
        assert_close(
            &right.transformed_to_space_vector(&lateral),
            &-left.transformed_to_space_vector(&lateral),
        );
    }

    #[test]
    fn test_yaw_180_flips_ap_and_ml() {
        let transform = CoordinateTransform::four_axis(Handedness::Right, 180.0);
        let forward = transform.transformed_to_space_vector(&Vector3::new(1.0, 1.0, 1.0));
        assert_close(&forward, &Vector3::new(-1.0, -1.0, 1.0));
    }

    #[test]
    fn test_three_axis_depth_axis_follows_probe() {
        let transform = CoordinateTransform::three_axis(Handedness::Right, 90.0, 30.0);
        let depth = transform.transformed_to_space_vector(&Vector3::new(0.0, 0.0, 1.0));
        let p = 30f64.to_radians();
        let y = 90f64.to_radians();
        assert_close(
            &depth,
            &Vector3::new(p.sin() * y.cos(), p.sin() * y.sin(), p.cos()),
        );
    }

    #[test]
    fn test_affine_scales_before_rotating() {
        let transform =
            CoordinateTransform::affine("stx", Vector3::new(2.0, 1.0, 1.0), 0.0, 0.0, 0.0)
                .unwrap();
        let t = transform.space_to_transformed(&Vector3::new(1.0, 1.0, 1.0));
        assert_close(&t, &Vector3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn test_origin_only_moves_points() {
        let transform = CoordinateTransform::four_axis(Handedness::Left, 45.0)
            .with_origin(Vector3::new(1.0, 2.0, 3.0));
        let zero = Vector3::zeros();
        assert_close(&transform.transformed_to_space_vector(&zero), &zero);
        assert_close(&transform.transformed_to_space(&zero), &Vector3::new(1.0, 2.0, 3.0));
    }
}
