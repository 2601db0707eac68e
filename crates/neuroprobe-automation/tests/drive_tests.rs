// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Insertion cycle drives against the simulated link.
//!
//! Layout shared by every test: one 4-axis device parked at `[10; 4]` and
//! zeroed there, identity transform, vertical probe. The entry coordinate is
//! 0.5 mm above the surface, the surface 1 mm below the zero point and the
//! target 2 mm below the surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use neuroprobe_automation::{
    DriveError, DriveOrchestrator, DriveOutcome, EchoConfig, InsertionPlan, ManipulatorSession,
    MemoryOutputLog, PositionEcho, SpeedProfile,
};
use neuroprobe_coordinates::{
    CoordinateSpace, CoordinateTransform, Insertion, InsertionAngles, Vector3,
};
use neuroprobe_link::{
    CommandKind, DevicePosition, LinkCommand, LinkError, LinkResult, ManipulatorInventory,
    ManipulatorLink, SimulatedManipulatorLink, SimulatorConfig,
};
use neuroprobe_state_manager::{AutomationState, StateError};

const DEVICE: &str = "1";

struct Rig {
    sim: Arc<SimulatedManipulatorLink>,
    session: Arc<ManipulatorSession>,
    log: Arc<MemoryOutputLog>,
    insertion: Insertion,
    plan: InsertionPlan,
}

/// Simulator whose position reads take `read_latency` to answer
struct SlowReads {
    sim: Arc<SimulatedManipulatorLink>,
    read_latency: Duration,
}

#[async_trait]
impl ManipulatorLink for SlowReads {
    async fn get_manipulators(&self) -> LinkResult<ManipulatorInventory> {
        self.sim.get_manipulators().await
    }

    async fn get_position(&self, id: &str) -> LinkResult<DevicePosition> {
        tokio::time::sleep(self.read_latency).await;
        self.sim.get_position(id).await
    }

    async fn set_position(
        &self,
        id: &str,
        position: DevicePosition,
        speed: f64,
    ) -> LinkResult<DevicePosition> {
        self.sim.set_position(id, position, speed).await
    }

    async fn set_depth(&self, id: &str, depth: f64, speed: f64) -> LinkResult<f64> {
        self.sim.set_depth(id, depth, speed).await
    }

    async fn set_writable(&self, id: &str, writable: bool, priority: f64) -> LinkResult<bool> {
        self.sim.set_writable(id, writable, priority).await
    }

    async fn stop(&self, id: &str) -> LinkResult<()> {
        self.sim.stop(id).await
    }
}

fn rig(config: SimulatorConfig) -> Rig {
    rig_with(config, |sim| sim)
}

/// Rig whose session talks to the simulator through `wrap`
fn rig_with(
    config: SimulatorConfig,
    wrap: impl FnOnce(Arc<SimulatedManipulatorLink>) -> Arc<dyn ManipulatorLink>,
) -> Rig {
    let sim = Arc::new(SimulatedManipulatorLink::new(config).with_device(DEVICE, [10.0; 4]));
    let session = Arc::new(ManipulatorSession::new(wrap(sim.clone())));
    let space = CoordinateSpace::new(
        "bench",
        Vector3::new(8.0, 8.0, 8.0),
        Vector3::new(0.1, 0.1, 0.1),
        Vector3::zeros(),
    )
    .unwrap();
    let insertion = Insertion::new(
        Vector3::new(0.0, 0.0, 3.0),
        InsertionAngles::new(0.0, 0.0, 0.0),
        Arc::new(space),
        Arc::new(CoordinateTransform::identity()),
    );
    let plan = InsertionPlan {
        entry_coordinate: Vector3::new(0.0, 0.0, 0.5),
        surface_coordinate: Vector3::new(0.0, 0.0, 1.0),
        target_coordinate: Vector3::new(0.0, 0.0, 3.0),
        insertion_depth: 2.0,
    };
    Rig {
        sim,
        session,
        log: Arc::new(MemoryOutputLog::new()),
        insertion,
        plan,
    }
}

/// Connect, zero, drive to entry, lower to the surface and mark dura
async fn at_dura(rig: &Rig, speeds: SpeedProfile) -> DriveOrchestrator {
    rig.session.connect().await.unwrap();
    let mut orchestrator = DriveOrchestrator::new(DEVICE, rig.session.clone(), speeds)
        .unwrap()
        .with_output_log(rig.log.clone());
    orchestrator.calibrate_zero().await.unwrap();

    let outcome = orchestrator
        .drive_to_entry(&rig.insertion, &rig.plan)
        .await
        .unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(rig.sim.position(DEVICE), Some([10.0, 10.0, 10.5, 10.0]));

    // Operator lowers the shank onto the dura by hand
    rig.sim.set_writable(DEVICE, true, 0.0).await.unwrap();
    rig.sim.set_depth(DEVICE, 10.5, 1.0).await.unwrap();
    rig.sim.set_writable(DEVICE, false, 0.0).await.unwrap();

    let dura = orchestrator
        .reset_dura(&rig.insertion, &rig.plan.surface_coordinate)
        .await
        .unwrap();
    assert_eq!(dura, 10.5);
    assert_eq!(orchestrator.automation_state(), AutomationState::AtDuraInsert);
    rig.sim.clear_history();
    orchestrator
}

fn depth_moves(sim: &SimulatedManipulatorLink) -> Vec<f64> {
    sim.moves()
        .iter()
        .filter_map(|c| match c {
            LinkCommand::SetDepth { depth, .. } => Some(*depth),
            _ => None,
        })
        .collect()
}

fn assert_depths(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
    }
}

#[tokio::test]
async fn full_cycle_returns_to_entry() {
    let rig = rig(SimulatorConfig::default());
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;

    let outcome = orchestrator.drive_to_target(&rig.plan).await.unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(orchestrator.automation_state(), AutomationState::AtTarget);
    assert_depths(&depth_moves(&rig.sim), &[12.45, 12.55, 12.5]);
    assert!(!rig.sim.is_writable(DEVICE));

    rig.sim.clear_history();
    let outcome = orchestrator
        .drive_out(&rig.insertion, &rig.plan)
        .await
        .unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(orchestrator.automation_state(), AutomationState::AtEntryCoordinate);
    assert_depths(&depth_moves(&rig.sim), &[12.45, 10.5, 10.4]);

    // Tip back on the entry coordinate with the depth axis left at the margin
    let position = rig.sim.position(DEVICE).unwrap();
    assert!((position[2] - 10.1).abs() < 1e-9, "{position:?}");
    assert!((position[3] - 10.4).abs() < 1e-9, "{position:?}");
    assert!(!rig.sim.is_writable(DEVICE));

    assert_eq!(rig.log.events("drive_started").len(), 3);
    assert_eq!(rig.log.events("drive_completed").len(), 3);
}

#[tokio::test]
async fn zero_near_distance_skips_first_phase() {
    let rig = rig(SimulatorConfig::default());
    let speeds = SpeedProfile {
        near_target_distance: 0.0,
        ..SpeedProfile::default()
    };
    let mut orchestrator = at_dura(&rig, speeds).await;

    let outcome = orchestrator.drive_to_target(&rig.plan).await.unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_depths(&depth_moves(&rig.sim), &[12.55, 12.5]);
    assert_eq!(orchestrator.automation_state(), AutomationState::AtTarget);
}

#[tokio::test]
async fn link_failure_in_second_phase_reverts_to_near_target() {
    let rig = rig(SimulatorConfig::default());
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;
    let fault = LinkError::Hardware {
        id: DEVICE.to_string(),
        message: "motor stall".to_string(),
    };
    rig.sim
        .inject_fault_after(CommandKind::SetDepth, 1, fault.clone());

    let err = orchestrator.drive_to_target(&rig.plan).await.unwrap_err();
    assert_eq!(err, DriveError::Link(fault));
    assert_eq!(
        orchestrator.automation_state(),
        AutomationState::AtNearTargetInsert
    );
    // Near-target move, then the failed past-target move, nothing after
    assert_eq!(depth_moves(&rig.sim).len(), 2);
    assert!(!rig.sim.is_writable(DEVICE));
    assert_eq!(rig.log.events("drive_failed").len(), 1);

    // The next attempt resumes from the landmark
    rig.sim.clear_history();
    let outcome = orchestrator.drive_to_target(&rig.plan).await.unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_depths(&depth_moves(&rig.sim), &[12.55, 12.5]);
}

#[tokio::test]
async fn out_of_travel_target_fails_before_any_write() {
    let rig = rig(SimulatorConfig::default());
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;
    let deep = InsertionPlan {
        insertion_depth: 15.0,
        ..rig.plan
    };

    let err = orchestrator.drive_to_target(&deep).await.unwrap_err();
    assert!(matches!(
        err,
        DriveError::OutOfBounds { axis: 3, .. }
    ), "{err:?}");
    assert!(rig.sim.history().is_empty());
    assert_eq!(orchestrator.automation_state(), AutomationState::AtDuraInsert);
}

#[tokio::test]
async fn insert_requires_dura_contact() {
    let rig = rig(SimulatorConfig::default());
    rig.session.connect().await.unwrap();
    let mut orchestrator =
        DriveOrchestrator::new(DEVICE, rig.session.clone(), SpeedProfile::default()).unwrap();
    orchestrator.calibrate_zero().await.unwrap();

    let err = orchestrator.drive_to_target(&rig.plan).await.unwrap_err();
    assert!(matches!(
        err,
        DriveError::State(StateError::InvalidTransition {
            from: AutomationState::IsCalibrated,
            ..
        })
    ));
    assert!(rig.sim.moves().is_empty());
}

#[tokio::test]
async fn unknown_device_is_rejected() {
    let rig = rig(SimulatorConfig::default());
    rig.session.connect().await.unwrap();
    let result = DriveOrchestrator::new("9", rig.session.clone(), SpeedProfile::default());
    assert!(matches!(result, Err(DriveError::NotRegistered(id)) if id == "9"));
}

#[tokio::test(start_paused = true)]
async fn stop_halts_drive_without_reverting() {
    let rig = rig(SimulatorConfig {
        time_scale: 1.0,
        ..SimulatorConfig::default()
    });
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;
    let stop = orchestrator.stop_handle();

    let (outcome, stopped) = tokio::join!(orchestrator.drive_to_target(&rig.plan), async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        stop.stop().await
    });
    stopped.unwrap();
    assert_eq!(outcome.unwrap(), DriveOutcome::Stopped);
    assert_eq!(
        orchestrator.automation_state(),
        AutomationState::DrivingToNearTarget
    );
    assert!(!rig.sim.is_writable(DEVICE));
    assert_eq!(rig.log.events("drive_stopped").len(), 1);

    let depth = rig.sim.position(DEVICE).unwrap()[3];
    assert!(depth > 10.5 && depth < 12.45, "halted at {depth}");

    // Resuming continues from where it halted
    let outcome = orchestrator.drive_to_target(&rig.plan).await.unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(orchestrator.automation_state(), AutomationState::AtTarget);
}

#[tokio::test]
async fn echo_publishes_probe_pose() {
    let rig = rig(SimulatorConfig::default());
    rig.session.connect().await.unwrap();
    rig.session
        .set_zero_coordinate_offset(DEVICE, [10.0, 10.0, 9.0, 10.0])
        .unwrap();

    let config = EchoConfig {
        poll_interval: Duration::from_millis(5),
        ..EchoConfig::default()
    };
    let (echo, mut poses) = PositionEcho::spawn(
        rig.session.clone(),
        DEVICE,
        rig.insertion.clone(),
        config,
        rig.log.clone(),
    )
    .unwrap();

    poses.changed().await.unwrap();
    let pose = poses.borrow().unwrap();
    assert_eq!(pose.device_position, [10.0; 4]);
    assert!((pose.transformed - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-9);
    let world = rig.insertion.space().space_to_world(&pose.atlas);
    assert!((pose.world - world).norm() < 1e-9);

    echo.shutdown().await;
    assert_eq!(rig.log.events("position").len(), 1);
}

#[tokio::test]
async fn echo_requires_registered_device() {
    let rig = rig(SimulatorConfig::default());
    let result = PositionEcho::spawn(
        rig.session.clone(),
        DEVICE,
        rig.insertion.clone(),
        EchoConfig::default(),
        rig.log.clone(),
    );
    assert!(matches!(result, Err(DriveError::NotRegistered(_))));
}

#[tokio::test(start_paused = true)]
async fn stop_during_position_read_sends_no_further_move() {
    let rig = rig_with(
        SimulatorConfig {
            time_scale: 1.0,
            ..SimulatorConfig::default()
        },
        |sim| {
            Arc::new(SlowReads {
                sim,
                read_latency: Duration::from_secs(1),
            })
        },
    );
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;
    let stop = orchestrator.stop_handle();

    // Stop lands while the depth read that precedes the first move is pending
    let (outcome, stopped) = tokio::join!(orchestrator.drive_to_target(&rig.plan), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.stop().await
    });
    stopped.unwrap();
    assert_eq!(outcome.unwrap(), DriveOutcome::Stopped);
    assert!(depth_moves(&rig.sim).is_empty(), "{:?}", rig.sim.moves());
    assert_eq!(rig.sim.position(DEVICE).unwrap()[3], 10.5);
    assert!(!rig.sim.is_writable(DEVICE));
}

#[tokio::test]
async fn refused_write_gate_reverts_entry_drive() {
    let rig = rig(SimulatorConfig::default());
    rig.session.connect().await.unwrap();
    let mut orchestrator =
        DriveOrchestrator::new(DEVICE, rig.session.clone(), SpeedProfile::default()).unwrap();
    orchestrator.calibrate_zero().await.unwrap();
    let fault = LinkError::Hardware {
        id: DEVICE.to_string(),
        message: "gate held by another client".to_string(),
    };
    rig.sim.inject_fault(CommandKind::SetWritable, fault.clone());

    let err = orchestrator
        .drive_to_entry(&rig.insertion, &rig.plan)
        .await
        .unwrap_err();
    assert_eq!(err, DriveError::Link(fault));
    assert_eq!(orchestrator.automation_state(), AutomationState::IsCalibrated);
    assert!(rig.sim.moves().is_empty());

    let outcome = orchestrator
        .drive_to_entry(&rig.insertion, &rig.plan)
        .await
        .unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(
        orchestrator.automation_state(),
        AutomationState::AtEntryCoordinate
    );
}

#[tokio::test]
async fn link_failure_during_exit_reverts_to_last_landmark() {
    let rig = rig(SimulatorConfig::default());
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;
    orchestrator.drive_to_target(&rig.plan).await.unwrap();
    rig.sim.clear_history();

    let fault = LinkError::Hardware {
        id: DEVICE.to_string(),
        message: "motor stall".to_string(),
    };
    rig.sim
        .inject_fault_after(CommandKind::SetDepth, 1, fault.clone());

    let err = orchestrator
        .drive_out(&rig.insertion, &rig.plan)
        .await
        .unwrap_err();
    assert_eq!(err, DriveError::Link(fault));
    assert_eq!(
        orchestrator.automation_state(),
        AutomationState::AtNearTargetExit
    );
    // Near-target move, then the failed move toward dura, nothing after
    assert_depths(&depth_moves(&rig.sim), &[12.45, 10.5]);
    assert_eq!(rig.sim.moves().len(), 2);
    assert!(!rig.sim.is_writable(DEVICE));

    rig.sim.clear_history();
    let outcome = orchestrator
        .drive_out(&rig.insertion, &rig.plan)
        .await
        .unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_depths(&depth_moves(&rig.sim), &[10.5, 10.4]);
    assert_eq!(
        orchestrator.automation_state(),
        AutomationState::AtEntryCoordinate
    );
}

#[tokio::test]
async fn failed_stop_is_withdrawn() {
    let rig = rig(SimulatorConfig::default());
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;
    let stop = orchestrator.stop_handle();
    rig.sim.inject_fault(
        CommandKind::Stop,
        LinkError::Unreachable("link dropped".to_string()),
    );

    assert!(stop.stop().await.is_err());
    assert!(!stop.is_requested());

    let outcome = orchestrator.drive_to_target(&rig.plan).await.unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(orchestrator.automation_state(), AutomationState::AtTarget);
}

#[tokio::test]
async fn gate_release_failure_keeps_completed_outcome() {
    let rig = rig(SimulatorConfig::default());
    let mut orchestrator = at_dura(&rig, SpeedProfile::default()).await;
    rig.sim.inject_fault_after(
        CommandKind::SetWritable,
        1,
        LinkError::Unreachable("link dropped".to_string()),
    );

    let outcome = orchestrator.drive_to_target(&rig.plan).await.unwrap();
    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(orchestrator.automation_state(), AutomationState::AtTarget);
    assert_eq!(rig.log.events("gate_release_failed").len(), 1);
    assert_eq!(rig.log.events("drive_failed").len(), 0);
}
