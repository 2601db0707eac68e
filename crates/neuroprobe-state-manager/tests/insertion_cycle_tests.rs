// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use neuroprobe_state_manager::{AutomationState, AutomationStateManager, StateError};
use proptest::prelude::*;

fn calibrated_at_dura() -> AutomationStateManager {
    let mut manager = AutomationStateManager::new();
    manager.set_calibrated();
    manager.set_driving_to_target_entry_coordinate().unwrap();
    manager.set_at_entry_coordinate().unwrap();
    manager.set_at_dura_insert().unwrap();
    manager
}

#[test]
fn legal_sequence_from_uncalibrated() {
    let mut manager = AutomationStateManager::new();
    assert!(manager.set_driving_to_target_entry_coordinate().is_err());

    manager.set_calibrated();
    manager.set_driving_to_target_entry_coordinate().unwrap();
    assert!(manager.is_driving());
    manager.set_at_entry_coordinate().unwrap();
    assert!(manager.has_reached_target_entry_coordinate());
    manager.set_at_dura_insert().unwrap();
    assert_eq!(manager.state(), AutomationState::AtDuraInsert);
}

#[test]
fn increment_from_dura_visits_every_state_to_target() {
    let mut manager = calibrated_at_dura();
    let mut visited = vec![manager.state()];
    while !manager.is_at_target() {
        manager.increment_insertion_cycle_state().unwrap();
        visited.push(manager.state());
    }

    let expected: Vec<_> = AutomationState::ALL
        [AutomationState::AtDuraInsert.index() as usize..=AutomationState::AtTarget.index() as usize]
        .to_vec();
    assert_eq!(visited, expected);
}

#[test]
fn full_cycle_returns_to_entry_coordinate() {
    let mut manager = calibrated_at_dura();
    while manager.state() != AutomationState::ExitingToTargetEntryCoordinate {
        manager.increment_insertion_cycle_state().unwrap();
    }
    manager.set_at_entry_coordinate().unwrap();

    // A second insertion may start from the entry coordinate
    manager.set_at_dura_insert().unwrap();
    assert!(manager.is_insertable());
}

fn any_state() -> impl Strategy<Value = AutomationState> {
    (0u8..18).prop_map(|i| AutomationState::from_index(i).unwrap())
}

/// Walk a fresh manager into `target` through legal transitions only
fn manager_in(target: AutomationState) -> AutomationStateManager {
    let mut manager = AutomationStateManager::new();
    if target == AutomationState::IsUncalibrated {
        return manager;
    }
    manager.set_calibrated();
    if target == AutomationState::IsCalibrated {
        return manager;
    }
    manager.set_driving_to_target_entry_coordinate().unwrap();
    if target == AutomationState::DrivingToTargetEntryCoordinate {
        return manager;
    }
    manager.set_at_entry_coordinate().unwrap();
    if target == AutomationState::AtEntryCoordinate {
        return manager;
    }
    manager.set_at_dura_insert().unwrap();
    while manager.state() != target {
        manager.increment_insertion_cycle_state().unwrap();
    }
    manager
}

proptest! {
    #[test]
    fn rejected_transitions_leave_state_unchanged(state in any_state()) {
        let mut manager = manager_in(state);
        let results = [
            manager_in(state).set_driving_to_target_entry_coordinate(),
            manager_in(state).set_at_entry_coordinate(),
            manager_in(state).set_at_dura_insert(),
            manager_in(state).increment_insertion_cycle_state(),
            manager_in(state).set_to_insertion_driving_state(),
        ];
        for result in results {
            if let Err(StateError::InvalidTransition { from, .. }) = result {
                prop_assert_eq!(from, state);
            }
        }
        // Rejections never move the manager
        if manager.set_at_dura_insert().is_err() {
            prop_assert_eq!(manager.state(), state);
        }
    }

    #[test]
    fn set_calibrated_resets_from_any_state(state in any_state()) {
        let mut manager = manager_in(state);
        manager.set_calibrated();
        prop_assert_eq!(manager.state(), AutomationState::IsCalibrated);
    }

    #[test]
    fn insertable_and_exitable_are_disjoint(state in any_state()) {
        let manager = manager_in(state);
        prop_assert!(!(manager.is_insertable() && manager.is_exitable()));
    }
}
