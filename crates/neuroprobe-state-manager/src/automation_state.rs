// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Ordered insertion cycle states and the guarded state manager.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::{self, EventReceiver, EventSender, StateEvent};
use crate::{Result, StateError};

/// Insertion cycle state
///
/// The discriminant is the position in the cycle. Range predicates below are
/// written against it, so reordering variants changes behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AutomationState {
    #[default]
    IsUncalibrated = 0,
    IsCalibrated = 1,
    DrivingToTargetEntryCoordinate = 2,
    AtEntryCoordinate = 3,
    AtDuraInsert = 4,
    DrivingToNearTarget = 5,
    AtNearTargetInsert = 6,
    DrivingToPastTarget = 7,
    AtPastTarget = 8,
    ReturningToTarget = 9,
    AtTarget = 10,
    ExitingToNearTarget = 11,
    AtNearTargetExit = 12,
    ExitingToDura = 13,
    AtDuraExit = 14,
    ExitingToMargin = 15,
    AtExitMargin = 16,
    ExitingToTargetEntryCoordinate = 17,
}

impl AutomationState {
    /// Every state in cycle order
    pub const ALL: [AutomationState; 18] = [
        AutomationState::IsUncalibrated,
        AutomationState::IsCalibrated,
        AutomationState::DrivingToTargetEntryCoordinate,
        AutomationState::AtEntryCoordinate,
        AutomationState::AtDuraInsert,
        AutomationState::DrivingToNearTarget,
        AutomationState::AtNearTargetInsert,
        AutomationState::DrivingToPastTarget,
        AutomationState::AtPastTarget,
        AutomationState::ReturningToTarget,
        AutomationState::AtTarget,
        AutomationState::ExitingToNearTarget,
        AutomationState::AtNearTargetExit,
        AutomationState::ExitingToDura,
        AutomationState::AtDuraExit,
        AutomationState::ExitingToMargin,
        AutomationState::AtExitMargin,
        AutomationState::ExitingToTargetEntryCoordinate,
    ];

    /// Position in the cycle
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Following state in cycle order, `None` for the last one
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// True for states where a commanded move is in flight
    pub fn is_driving(self) -> bool {
        matches!(
            self,
            AutomationState::DrivingToTargetEntryCoordinate
                | AutomationState::DrivingToNearTarget
                | AutomationState::DrivingToPastTarget
                | AutomationState::ReturningToTarget
                | AutomationState::ExitingToNearTarget
                | AutomationState::ExitingToDura
                | AutomationState::ExitingToMargin
                | AutomationState::ExitingToTargetEntryCoordinate
        )
    }

    /// True for confirmed resting states (the complement of driving)
    pub fn is_landmark(self) -> bool {
        !self.is_driving()
    }

    fn within(self, low: AutomationState, high: AutomationState) -> bool {
        (low.index()..=high.index()).contains(&self.index())
    }
}

impl fmt::Display for AutomationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Guarded state machine for one probe/manipulator pairing
#[derive(Debug)]
pub struct AutomationStateManager {
    state: AutomationState,
    /// Most recent resting state; drives revert here when aborted
    last_landmark: AutomationState,
    events: EventSender,
}

impl Default for AutomationStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomationStateManager {
    pub fn new() -> Self {
        let (events, _) = events::channel();
        Self {
            state: AutomationState::IsUncalibrated,
            last_landmark: AutomationState::IsUncalibrated,
            events,
        }
    }

    /// Subscribe to transition events
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn state(&self) -> AutomationState {
        self.state
    }

    /// Most recent confirmed resting state
    pub fn last_landmark(&self) -> AutomationState {
        self.last_landmark
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Universal reset point, legal from any state
    pub fn set_calibrated(&mut self) {
        self.apply(AutomationState::IsCalibrated);
    }

    pub fn set_driving_to_target_entry_coordinate(&mut self) -> Result<()> {
        match self.state {
            AutomationState::IsCalibrated | AutomationState::AtEntryCoordinate => {
                self.apply(AutomationState::DrivingToTargetEntryCoordinate);
                Ok(())
            }
            _ => Err(self.reject("drive to target entry coordinate")),
        }
    }

    pub fn set_at_entry_coordinate(&mut self) -> Result<()> {
        match self.state {
            AutomationState::DrivingToTargetEntryCoordinate
            | AutomationState::ExitingToTargetEntryCoordinate => {
                self.apply(AutomationState::AtEntryCoordinate);
                Ok(())
            }
            _ => Err(self.reject("arrive at entry coordinate")),
        }
    }

    pub fn set_at_dura_insert(&mut self) -> Result<()> {
        match self.state {
            AutomationState::AtEntryCoordinate | AutomationState::ExitingToDura => {
                self.apply(AutomationState::AtDuraInsert);
                Ok(())
            }
            _ => Err(self.reject("mark dura contact")),
        }
    }

    /// Complete one drive segment: advance to the next state in the cycle
    pub fn increment_insertion_cycle_state(&mut self) -> Result<()> {
        if !self.state.within(
            AutomationState::AtDuraInsert,
            AutomationState::ExitingToTargetEntryCoordinate,
        ) {
            return Err(self.reject("advance insertion cycle"));
        }
        match self.state.next() {
            Some(next) => {
                self.apply(next);
                Ok(())
            }
            None => Err(self.reject("advance past the end of the insertion cycle")),
        }
    }

    /// Re-enter a drive: map a landmark to the driving state that follows it
    ///
    /// A state that is already driving maps to itself.
    pub fn set_to_insertion_driving_state(&mut self) -> Result<()> {
        use AutomationState::*;
        let driving = match self.state {
            AtDuraInsert => DrivingToNearTarget,
            AtNearTargetInsert => DrivingToPastTarget,
            AtPastTarget => ReturningToTarget,
            AtTarget => ExitingToNearTarget,
            AtNearTargetExit => ExitingToDura,
            state if state.within(AtDuraInsert, ExitingToDura) => state,
            _ => return Err(self.reject("resume insertion drive")),
        };
        if driving != self.state {
            self.apply(driving);
        }
        Ok(())
    }

    /// Abandon the in-flight drive and fall back to the last resting state
    pub fn abort_drive(&mut self) -> Result<()> {
        if !self.state.is_driving() {
            return Err(self.reject("abort drive"));
        }
        let from = self.state;
        self.state = self.last_landmark;
        warn!(
            target: "neuroprobe-state-manager",
            "Drive aborted in {}, reverted to {}", from, self.state
        );
        let _ = self.events.send(StateEvent::DriveAborted {
            from,
            reverted_to: self.state,
        });
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_calibrated(&self) -> bool {
        self.state.index() >= AutomationState::IsCalibrated.index()
    }

    pub fn has_reached_target_entry_coordinate(&self) -> bool {
        self.state.index() >= AutomationState::AtEntryCoordinate.index()
    }

    /// Dura is confirmed and the target has not been reached yet
    pub fn is_insertable(&self) -> bool {
        self.state
            .within(AutomationState::AtDuraInsert, AutomationState::ReturningToTarget)
    }

    /// The target was reached and the probe has not fully exited yet
    pub fn is_exitable(&self) -> bool {
        self.state.within(
            AutomationState::AtTarget,
            AutomationState::ExitingToTargetEntryCoordinate,
        )
    }

    pub fn is_driving(&self) -> bool {
        self.state.is_driving()
    }

    pub fn is_at_target(&self) -> bool {
        self.state == AutomationState::AtTarget
    }

    fn apply(&mut self, to: AutomationState) {
        let from = self.state;
        self.state = to;
        if to.is_landmark() {
            self.last_landmark = to;
        }
        debug!(target: "neuroprobe-state-manager", "{} -> {}", from, to);
        let _ = self.events.send(StateEvent::Transitioned { from, to });
    }

    fn reject(&self, requested: &'static str) -> StateError {
        debug!(
            target: "neuroprobe-state-manager",
            "Rejected '{}' from {}", requested, self.state
        );
        StateError::InvalidTransition {
            from: self.state,
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_dura() -> AutomationStateManager {
        let mut manager = AutomationStateManager::new();
        manager.set_calibrated();
        manager.set_driving_to_target_entry_coordinate().unwrap();
        manager.set_at_entry_coordinate().unwrap();
        manager.set_at_dura_insert().unwrap();
        manager
    }

    #[test]
    fn test_index_matches_cycle_order() {
        for (i, state) in AutomationState::ALL.iter().enumerate() {
            assert_eq!(usize::from(state.index()), i);
            assert_eq!(AutomationState::from_index(i as u8), Some(*state));
        }
        assert_eq!(AutomationState::from_index(18), None);
    }

    #[test]
    fn test_starts_uncalibrated() {
        let manager = AutomationStateManager::new();
        assert_eq!(manager.state(), AutomationState::IsUncalibrated);
        assert!(!manager.is_calibrated());
    }

    #[test]
    fn test_dura_insert_requires_entry_coordinate() {
        let mut manager = AutomationStateManager::new();
        let err = manager.set_at_dura_insert().unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidTransition {
                from: AutomationState::IsUncalibrated,
                ..
            }
        ));
        assert_eq!(manager.state(), AutomationState::IsUncalibrated);
    }

    #[test]
    fn test_increment_fails_outside_cycle() {
        let mut manager = AutomationStateManager::new();
        manager.set_calibrated();
        assert!(manager.increment_insertion_cycle_state().is_err());
        assert_eq!(manager.state(), AutomationState::IsCalibrated);
    }

    #[test]
    fn test_increment_fails_at_last_state() {
        let mut manager = at_dura();
        while manager.state() != AutomationState::ExitingToTargetEntryCoordinate {
            manager.increment_insertion_cycle_state().unwrap();
        }
        assert!(manager.increment_insertion_cycle_state().is_err());
        manager.set_at_entry_coordinate().unwrap();
        assert_eq!(manager.state(), AutomationState::AtEntryCoordinate);
    }

    #[test]
    fn test_driving_state_mapping() {
        let mut manager = at_dura();
        manager.set_to_insertion_driving_state().unwrap();
        assert_eq!(manager.state(), AutomationState::DrivingToNearTarget);

        // Driving maps to itself
        manager.set_to_insertion_driving_state().unwrap();
        assert_eq!(manager.state(), AutomationState::DrivingToNearTarget);

        manager.increment_insertion_cycle_state().unwrap();
        manager.set_to_insertion_driving_state().unwrap();
        assert_eq!(manager.state(), AutomationState::DrivingToPastTarget);
    }

    #[test]
    fn test_driving_state_rejected_after_dura_exit() {
        let mut manager = at_dura();
        while manager.state() != AutomationState::AtDuraExit {
            manager.increment_insertion_cycle_state().unwrap();
        }
        assert!(manager.set_to_insertion_driving_state().is_err());
    }

    #[test]
    fn test_abort_reverts_to_last_landmark() {
        let mut manager = at_dura();
        manager.set_to_insertion_driving_state().unwrap();
        manager.increment_insertion_cycle_state().unwrap();
        manager.set_to_insertion_driving_state().unwrap();
        assert_eq!(manager.state(), AutomationState::DrivingToPastTarget);

        manager.abort_drive().unwrap();
        assert_eq!(manager.state(), AutomationState::AtNearTargetInsert);
        assert!(manager.abort_drive().is_err());
    }

    #[test]
    fn test_exit_can_return_to_dura_insert() {
        let mut manager = at_dura();
        while manager.state() != AutomationState::ExitingToDura {
            manager.increment_insertion_cycle_state().unwrap();
        }
        manager.set_at_dura_insert().unwrap();
        assert!(manager.is_insertable());
    }

    #[test]
    fn test_predicates() {
        let mut manager = at_dura();
        assert!(manager.is_calibrated());
        assert!(manager.has_reached_target_entry_coordinate());
        assert!(manager.is_insertable());
        assert!(!manager.is_exitable());

        while !manager.is_at_target() {
            manager.increment_insertion_cycle_state().unwrap();
        }
        assert!(!manager.is_insertable());
        assert!(manager.is_exitable());
        assert!(!manager.is_driving());
    }

    #[tokio::test]
    async fn test_transitions_are_broadcast() {
        let mut manager = AutomationStateManager::new();
        let mut events = manager.subscribe();
        manager.set_calibrated();
        assert_eq!(
            events.recv().await.unwrap(),
            StateEvent::Transitioned {
                from: AutomationState::IsUncalibrated,
                to: AutomationState::IsCalibrated,
            }
        );
    }
}
