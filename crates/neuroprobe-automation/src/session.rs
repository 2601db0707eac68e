// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device registry shared by every orchestrator and echo loop on one link.

use std::sync::Arc;

use ahash::AHashMap;
use neuroprobe_link::{DevicePosition, ManipulatorLink, ManipulatorLinkState};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{DriveError, DriveResult};

/// Registered device: link calibration plus the recorded dura depth
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub link_state: ManipulatorLinkState,
    /// Depth-axis reading at dura contact, once recorded
    pub dura_depth: Option<f64>,
}

/// Registry of the devices reachable through one link
pub struct ManipulatorSession {
    link: Arc<dyn ManipulatorLink>,
    devices: RwLock<AHashMap<String, DeviceRecord>>,
}

impl ManipulatorSession {
    pub fn new(link: Arc<dyn ManipulatorLink>) -> Self {
        Self {
            link,
            devices: RwLock::new(AHashMap::new()),
        }
    }

    pub fn link(&self) -> Arc<dyn ManipulatorLink> {
        Arc::clone(&self.link)
    }

    /// Register every device the link reports
    ///
    /// Devices already registered keep their offsets and dura depth.
    pub async fn connect(&self) -> DriveResult<Vec<String>> {
        let inventory = self.link.get_manipulators().await?;
        for id in &inventory.ids {
            if !self.is_registered(id) {
                self.register(id, inventory.num_axes, inventory.dimensions)?;
            }
        }
        info!(
            target: "neuroprobe-automation",
            "Connected to {} manipulator(s), {} axes",
            inventory.ids.len(),
            inventory.num_axes
        );
        Ok(inventory.ids)
    }

    pub fn register(&self, id: &str, num_axes: u8, dimensions: DevicePosition) -> DriveResult<()> {
        let link_state = ManipulatorLinkState::new(id, num_axes, dimensions)?;
        debug!(target: "neuroprobe-automation", "Registered manipulator '{}'", id);
        self.devices.write().insert(
            id.to_string(),
            DeviceRecord {
                link_state,
                dura_depth: None,
            },
        );
        Ok(())
    }

    /// Drop a device and its offsets; returns whether it was registered
    pub fn deregister(&self, id: &str) -> bool {
        self.devices.write().remove(id).is_some()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.devices.read().contains_key(id)
    }

    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn record(&self, id: &str) -> DriveResult<DeviceRecord> {
        self.devices
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DriveError::NotRegistered(id.to_string()))
    }

    pub fn link_state(&self, id: &str) -> DriveResult<ManipulatorLinkState> {
        Ok(self.record(id)?.link_state)
    }

    pub fn set_zero_coordinate_offset(&self, id: &str, offset: DevicePosition) -> DriveResult<()> {
        self.update(id, |r| r.link_state.set_zero_coordinate_offset(offset))
    }

    pub fn set_brain_surface_offset(&self, id: &str, offset: f64) -> DriveResult<()> {
        self.update(id, |r| r.link_state.set_brain_surface_offset(offset))
    }

    pub fn dura_depth(&self, id: &str) -> DriveResult<Option<f64>> {
        Ok(self.record(id)?.dura_depth)
    }

    pub fn set_dura_depth(&self, id: &str, depth: f64) -> DriveResult<()> {
        self.update(id, |r| r.dura_depth = Some(depth))
    }

    fn update<R>(&self, id: &str, f: impl FnOnce(&mut DeviceRecord) -> R) -> DriveResult<R> {
        let mut devices = self.devices.write();
        let record = devices
            .get_mut(id)
            .ok_or_else(|| DriveError::NotRegistered(id.to_string()))?;
        Ok(f(record))
    }
}
