// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Data transfer objects exchanged over the manipulator link.
*/

use serde::{Deserialize, Serialize};

/// Raw device position: three translation axes plus the depth axis, mm
pub type DevicePosition = [f64; 4];

/// Devices attached to a link server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulatorInventory {
    pub ids: Vec<String>,
    /// Axis count shared by every attached device (3 or 4)
    pub num_axes: u8,
    /// Travel range per axis, mm; valid positions lie in `[0, dimension]`
    pub dimensions: DevicePosition,
}

/// Request logged by the simulator, in issue order
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    GetManipulators,
    GetPosition { id: String },
    SetPosition {
        id: String,
        position: DevicePosition,
        speed: f64,
    },
    SetDepth { id: String, depth: f64, speed: f64 },
    SetWritable {
        id: String,
        writable: bool,
        priority: f64,
    },
    Stop { id: String },
}

impl LinkCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            LinkCommand::GetManipulators => CommandKind::GetManipulators,
            LinkCommand::GetPosition { .. } => CommandKind::GetPosition,
            LinkCommand::SetPosition { .. } => CommandKind::SetPosition,
            LinkCommand::SetDepth { .. } => CommandKind::SetDepth,
            LinkCommand::SetWritable { .. } => CommandKind::SetWritable,
            LinkCommand::Stop { .. } => CommandKind::Stop,
        }
    }

    /// True for commands that move the device
    pub fn is_move(&self) -> bool {
        matches!(
            self,
            LinkCommand::SetPosition { .. } | LinkCommand::SetDepth { .. }
        )
    }
}

/// Command discriminant, used to target fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    GetManipulators,
    GetPosition,
    SetPosition,
    SetDepth,
    SetWritable,
    Stop,
}
