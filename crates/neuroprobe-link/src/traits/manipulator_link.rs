// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Manipulator link trait.

Defines the request/response interface to the process that owns the
physical positioning hardware.
*/

use async_trait::async_trait;

use crate::types::*;

/// Manipulator link (transport-agnostic)
///
/// Every request completes at an arbitrary later time. Callers serialize
/// moves per device through [`ManipulatorLink::set_writable`]; position reads
/// may interleave with moves.
#[async_trait]
pub trait ManipulatorLink: Send + Sync {
    /// List attached devices
    ///
    /// # Errors
    /// * `LinkError::Unreachable` - Link server did not answer
    ///
    async fn get_manipulators(&self) -> LinkResult<ManipulatorInventory>;

    /// Read the raw device position
    ///
    /// # Errors
    /// * `LinkError::UnknownDevice` - No device with this id
    ///
    async fn get_position(&self, id: &str) -> LinkResult<DevicePosition>;

    /// Move all axes to `position` at `speed` mm/s
    ///
    /// Resolves once the move finished, with the position reached.
    ///
    /// # Errors
    /// * `LinkError::NotWritable` - Write gate not held
    /// * `LinkError::Stopped` - Halted by [`ManipulatorLink::stop`]
    /// * `LinkError::WriteRejected` / `LinkError::Hardware` - Device refused or faulted
    ///
    async fn set_position(
        &self,
        id: &str,
        position: DevicePosition,
        speed: f64,
    ) -> LinkResult<DevicePosition>;

    /// Move the depth axis to `depth` at `speed` mm/s
    ///
    /// Resolves with the depth reached. Errors as for
    /// [`ManipulatorLink::set_position`].
    async fn set_depth(&self, id: &str, depth: f64, speed: f64) -> LinkResult<f64>;

    /// Acquire or release the write gate
    ///
    /// Returns the gate state after the request.
    async fn set_writable(&self, id: &str, writable: bool, priority: f64) -> LinkResult<bool>;

    /// Halt any in-flight move immediately
    async fn stop(&self, id: &str) -> LinkResult<()>;
}
