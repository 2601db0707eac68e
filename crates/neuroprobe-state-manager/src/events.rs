// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event streaming for state changes

use tokio::sync::broadcast;

use crate::automation_state::AutomationState;

/// Buffered events per subscriber before lagging receivers drop old ones
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// State change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// A transition was applied
    Transitioned {
        from: AutomationState,
        to: AutomationState,
    },
    /// A drive was aborted and the state reverted to its last landmark
    DriveAborted {
        from: AutomationState,
        reverted_to: AutomationState,
    },
}

/// Event channel
pub type EventSender = broadcast::Sender<StateEvent>;
pub type EventReceiver = broadcast::Receiver<StateEvent>;

/// Create a fresh event channel
pub fn channel() -> (EventSender, EventReceiver) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
