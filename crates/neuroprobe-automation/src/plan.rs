// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Entry coordinate planning.

use neuroprobe_coordinates::{Insertion, LabelVolume, SurfaceFinder, SurfaceHit, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DriveError, DriveResult};

/// Where a drive starts and ends, in the insertion's transformed space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InsertionPlan {
    /// Point on the shank line `clearance` mm above the brain surface
    pub entry_coordinate: Vector3<f64>,
    /// First point on the shank line that touches the brain
    pub surface_coordinate: Vector3<f64>,
    pub target_coordinate: Vector3<f64>,
    /// Shank distance from surface to target, mm
    pub insertion_depth: f64,
}

/// Plan an insertion whose tip currently sits at the target
///
/// Marches up the shank line from the target to the brain surface and backs
/// off `clearance` mm from it for the entry coordinate.
///
/// # Errors
///
/// * `DriveError::SurfaceNotFound` - The shank line never enters the volume
/// * `DriveError::Config` - Degenerate insertion direction
pub fn plan_entry<V: LabelVolume + ?Sized>(
    insertion: &Insertion,
    volume: &V,
    finder: &SurfaceFinder,
    clearance: f64,
) -> DriveResult<InsertionPlan> {
    let space = insertion.space();
    let transform = insertion.transform();

    let target_space = insertion.position_space();
    let direction_space = insertion.direction_space();

    let bottom_index = space.space_to_index(&target_space);
    let direction_index = direction_space.component_div(&space.resolution());

    let surface_index = match finder.find_entry(volume, &bottom_index, &direction_index)? {
        SurfaceHit::Found(index) => index,
        SurfaceHit::NotFound => return Err(DriveError::SurfaceNotFound),
    };
    let surface_space = space.index_to_space(&surface_index);
    let entry_space = surface_space - direction_space * clearance;

    let plan = InsertionPlan {
        entry_coordinate: transform.space_to_transformed(&entry_space),
        surface_coordinate: transform.space_to_transformed(&surface_space),
        target_coordinate: insertion.position_apmldv(),
        insertion_depth: (target_space - surface_space).norm(),
    };
    debug!(
        target: "neuroprobe-automation",
        "Planned entry {:?}, depth {:.4} mm",
        plan.entry_coordinate.as_slice(),
        plan.insertion_depth
    );
    Ok(plan)
}
