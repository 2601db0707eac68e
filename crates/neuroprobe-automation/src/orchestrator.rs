// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Staged drives for one probe/manipulator pairing.
//!
//! ## Insertion
//!
//! ```text
//! AtDuraInsert ─(base speed)─► target − near_target_distance    [skipped when already close]
//!              ─(reduced)───► target + past_target_distance
//!              ─(reduced)───► target                            → AtTarget
//! ```
//!
//! ## Exit
//!
//! ```text
//! AtTarget ─(reduced)─► target − near_target_distance
//!          ─(base)────► dura
//!          ─(exit)────► dura − dura_margin_distance
//!          ─(exit)────► entry coordinate                        → AtEntryCoordinate
//! ```
//!
//! Both drives resume from whatever state the last run stopped in. A link
//! error aborts the phase, reverts the state to its last landmark and is
//! returned unchanged; nothing is retried. A user stop leaves the state
//! where it was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use neuroprobe_coordinates::{Insertion, Vector3};
use neuroprobe_link::{DevicePosition, LinkError, ManipulatorLink, ManipulatorLinkState};
use neuroprobe_state_manager::{
    AutomationState, AutomationStateManager, EventReceiver, StateError,
};
use tracing::{debug, info, warn};

use crate::error::{DriveError, DriveResult};
use crate::output_log::{LogRecord, OutputLog, TracingOutputLog, CATEGORY_AUTOMATION};
use crate::plan::InsertionPlan;
use crate::session::ManipulatorSession;
use crate::speed::SpeedProfile;

/// How a drive that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    Completed,
    /// Halted by a [`StopHandle`]; the state was left as is
    Stopped,
}

/// Halts the drive of one device from any task
#[derive(Clone)]
pub struct StopHandle {
    device_id: String,
    link: Arc<dyn ManipulatorLink>,
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request an immediate halt
    ///
    /// The in-flight drive issues no further moves once this is called. If
    /// the link refuses the stop the request is withdrawn and the error
    /// returned, so the drive keeps reporting what the hardware actually did.
    pub async fn stop(&self) -> DriveResult<()> {
        info!(target: "neuroprobe-automation", "Stop requested for '{}'", self.device_id);
        self.requested.store(true, Ordering::SeqCst);
        if let Err(e) = self.link.stop(&self.device_id).await {
            self.clear();
            warn!(
                target: "neuroprobe-automation",
                "Stop of '{}' failed at the link: {}", self.device_id, e
            );
            return Err(e.into());
        }
        Ok(())
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

enum Move {
    Depth(f64),
    Position(DevicePosition),
}

enum Step {
    Continue,
    Stopped,
}

/// Depth-axis targets for one plan, raw device units
#[derive(Debug, Clone, Copy)]
struct DepthTargets {
    dura: f64,
    near: f64,
    past: f64,
    target: f64,
    margin: f64,
}

/// Drives one device through the insertion cycle
pub struct DriveOrchestrator {
    device_id: String,
    session: Arc<ManipulatorSession>,
    link: Arc<dyn ManipulatorLink>,
    state: AutomationStateManager,
    speeds: SpeedProfile,
    write_priority: f64,
    output_log: Arc<dyn OutputLog>,
    stop: StopHandle,
}

impl DriveOrchestrator {
    /// # Errors
    ///
    /// * `DriveError::Config` - Invalid speed profile
    /// * `DriveError::NotRegistered` - Device unknown to the session
    pub fn new(
        device_id: impl Into<String>,
        session: Arc<ManipulatorSession>,
        speeds: SpeedProfile,
    ) -> DriveResult<Self> {
        let device_id = device_id.into();
        speeds.validate()?;
        if !session.is_registered(&device_id) {
            return Err(DriveError::NotRegistered(device_id));
        }
        let link = session.link();
        let stop = StopHandle {
            device_id: device_id.clone(),
            link: Arc::clone(&link),
            requested: Arc::new(AtomicBool::new(false)),
        };
        Ok(Self {
            device_id,
            session,
            link,
            state: AutomationStateManager::new(),
            speeds,
            write_priority: 0.0,
            output_log: Arc::new(TracingOutputLog),
            stop,
        })
    }

    pub fn with_write_priority(mut self, priority: f64) -> Self {
        self.write_priority = priority;
        self
    }

    pub fn with_output_log(mut self, output_log: Arc<dyn OutputLog>) -> Self {
        self.output_log = output_log;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn speeds(&self) -> &SpeedProfile {
        &self.speeds
    }

    /// Read-only view of the insertion cycle
    pub fn state(&self) -> &AutomationStateManager {
        &self.state
    }

    pub fn automation_state(&self) -> AutomationState {
        self.state.state()
    }

    pub fn subscribe_state(&self) -> EventReceiver {
        self.state.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    // ========================================================================
    // Calibration
    // ========================================================================

    /// Take the current device position as the transformed origin
    pub async fn calibrate_zero(&mut self) -> DriveResult<DevicePosition> {
        let position = self.link.get_position(&self.device_id).await?;
        self.session
            .set_zero_coordinate_offset(&self.device_id, position)?;
        self.session.set_brain_surface_offset(&self.device_id, 0.0)?;
        self.state.set_calibrated();
        info!(
            target: "neuroprobe-automation",
            "'{}' zeroed at {:?}", self.device_id, position
        );
        self.log(
            LogRecord::new(CATEGORY_AUTOMATION, "calibrate_zero", &self.device_id)
                .field(format!("{:?}", position)),
        );
        Ok(position)
    }

    /// Record dura contact at the current position
    ///
    /// `surface` is the brain surface in transformed space; the brain surface
    /// offset is set so the reported tip lies on it. Returns the recorded
    /// depth-axis reading.
    pub async fn reset_dura(
        &mut self,
        insertion: &Insertion,
        surface: &Vector3<f64>,
    ) -> DriveResult<f64> {
        let position = self.link.get_position(&self.device_id).await?;
        let mut link_state = self.session.link_state(&self.device_id)?;
        link_state.set_brain_surface_offset(0.0);

        let direction = insertion.direction_transformed();
        let length_squared = direction.norm_squared();
        if length_squared <= f64::EPSILON {
            return Err(DriveError::Config(
                "insertion direction has zero length".to_string(),
            ));
        }
        let uncorrected_tip = link_state.device_to_transformed(&position, &direction);
        let offset = (uncorrected_tip - surface).dot(&direction) / length_squared;
        let dura = link_state.depth_reading(&position);

        self.state.set_at_dura_insert()?;
        self.session
            .set_brain_surface_offset(&self.device_id, offset)?;
        self.session.set_dura_depth(&self.device_id, dura)?;
        info!(
            target: "neuroprobe-automation",
            "'{}' dura at depth {:.4}, brain surface offset {:.4}", self.device_id, dura, offset
        );
        self.log(
            LogRecord::new(CATEGORY_AUTOMATION, "reset_dura", &self.device_id)
                .field(dura)
                .field(offset),
        );
        Ok(dura)
    }

    // ========================================================================
    // Drives
    // ========================================================================

    /// Move above the entry coordinate: lateral first, then down
    ///
    /// The depth axis is left where it is.
    pub async fn drive_to_entry(
        &mut self,
        insertion: &Insertion,
        plan: &InsertionPlan,
    ) -> DriveResult<DriveOutcome> {
        let link_state = self.session.link_state(&self.device_id)?;
        let speed = self.speeds.exit_speed(plan.insertion_depth)?;
        let current = self.link.get_position(&self.device_id).await?;
        let target = self.entry_position(&link_state, insertion, plan, &current);
        let lateral = [target[0], target[1], current[2], current[3]];
        self.check_position(&link_state, &lateral)?;
        self.check_position(&link_state, &target)?;

        if self.state.state() != AutomationState::DrivingToTargetEntryCoordinate {
            self.state.set_driving_to_target_entry_coordinate()?;
        }
        self.begin_drive("entry").await?;
        let result = self.entry_phases(lateral, target, speed).await;
        self.end_drive("entry", result).await
    }

    /// Staged insertion from dura to the planned target depth
    pub async fn drive_to_target(&mut self, plan: &InsertionPlan) -> DriveResult<DriveOutcome> {
        if !self.state.is_insertable() {
            return Err(self.reject("insert toward target"));
        }
        let link_state = self.session.link_state(&self.device_id)?;
        let targets = self.depth_targets(&link_state, plan)?;
        for depth in [targets.near, targets.past, targets.target] {
            self.check_depth(&link_state, depth)?;
        }
        let insertion_speed = self.speeds.insertion_speed(plan.insertion_depth)?;
        let near_speed = self.speeds.near_target_speed(plan.insertion_depth)?;

        self.begin_drive("insert").await?;
        let result = self
            .insertion_phases(&link_state, &targets, insertion_speed, near_speed)
            .await;
        self.end_drive("insert", result).await
    }

    /// Staged retraction from the target back to the entry coordinate
    pub async fn drive_out(
        &mut self,
        insertion: &Insertion,
        plan: &InsertionPlan,
    ) -> DriveResult<DriveOutcome> {
        if !self.state.is_exitable() {
            return Err(self.reject("exit toward entry coordinate"));
        }
        let link_state = self.session.link_state(&self.device_id)?;
        let targets = self.depth_targets(&link_state, plan)?;
        for depth in [targets.near, targets.dura, targets.margin] {
            self.check_depth(&link_state, depth)?;
        }
        let near_speed = self.speeds.near_target_speed(plan.insertion_depth)?;
        let base_speed = self.speeds.insertion_speed(plan.insertion_depth)?;
        let exit_speed = self.speeds.exit_speed(plan.insertion_depth)?;

        self.begin_drive("exit").await?;
        let result = self
            .exit_phases(
                &link_state,
                insertion,
                plan,
                &targets,
                [near_speed, base_speed, exit_speed],
            )
            .await;
        self.end_drive("exit", result).await
    }

    async fn entry_phases(
        &mut self,
        lateral: DevicePosition,
        target: DevicePosition,
        speed: f64,
    ) -> DriveResult<DriveOutcome> {
        for position in [lateral, target] {
            if self.stop.is_requested() {
                return Ok(DriveOutcome::Stopped);
            }
            if let Step::Stopped = self.command(Move::Position(position), speed).await? {
                return Ok(DriveOutcome::Stopped);
            }
        }
        self.state.set_at_entry_coordinate()?;
        Ok(DriveOutcome::Completed)
    }

    async fn insertion_phases(
        &mut self,
        link_state: &ManipulatorLinkState,
        targets: &DepthTargets,
        insertion_speed: f64,
        near_speed: f64,
    ) -> DriveResult<DriveOutcome> {
        use AutomationState::*;
        loop {
            if self.stop.is_requested() {
                return Ok(DriveOutcome::Stopped);
            }
            let step = match self.state.state() {
                AtDuraInsert | DrivingToNearTarget => {
                    self.state.set_to_insertion_driving_state()?;
                    let depth = self.read_depth(link_state).await?;
                    let remaining = targets.target - depth;
                    let near_distance = self.speeds.near_target_distance;
                    if near_distance > 0.0 && remaining > near_distance {
                        self.command(Move::Depth(targets.near), insertion_speed)
                            .await?
                    } else {
                        debug!(
                            target: "neuroprobe-automation",
                            "'{}' within {:.4} mm of target, skipping near-target drive",
                            self.device_id, near_distance
                        );
                        Step::Continue
                    }
                }
                AtNearTargetInsert | DrivingToPastTarget => {
                    self.state.set_to_insertion_driving_state()?;
                    self.command(Move::Depth(targets.past), near_speed).await?
                }
                AtPastTarget | ReturningToTarget => {
                    self.state.set_to_insertion_driving_state()?;
                    self.command(Move::Depth(targets.target), near_speed)
                        .await?
                }
                AtTarget => return Ok(DriveOutcome::Completed),
                _ => return Err(self.reject("insert toward target")),
            };
            if let Step::Stopped = step {
                return Ok(DriveOutcome::Stopped);
            }
            self.state.increment_insertion_cycle_state()?;
        }
    }

    async fn exit_phases(
        &mut self,
        link_state: &ManipulatorLinkState,
        insertion: &Insertion,
        plan: &InsertionPlan,
        targets: &DepthTargets,
        [near_speed, base_speed, exit_speed]: [f64; 3],
    ) -> DriveResult<DriveOutcome> {
        use AutomationState::*;
        loop {
            if self.stop.is_requested() {
                return Ok(DriveOutcome::Stopped);
            }
            let step = match self.state.state() {
                AtTarget | ExitingToNearTarget => {
                    self.state.set_to_insertion_driving_state()?;
                    let depth = self.read_depth(link_state).await?;
                    if depth > targets.near {
                        self.command(Move::Depth(targets.near), near_speed).await?
                    } else {
                        Step::Continue
                    }
                }
                AtNearTargetExit | ExitingToDura => {
                    self.state.set_to_insertion_driving_state()?;
                    self.command(Move::Depth(targets.dura), base_speed).await?
                }
                AtDuraExit | ExitingToMargin => {
                    if self.state.state() == AtDuraExit {
                        self.state.increment_insertion_cycle_state()?;
                    }
                    self.command(Move::Depth(targets.margin), exit_speed)
                        .await?
                }
                AtExitMargin | ExitingToTargetEntryCoordinate => {
                    if self.state.state() == AtExitMargin {
                        self.state.increment_insertion_cycle_state()?;
                    }
                    let current = self.read_position().await?;
                    let entry = self.entry_position(link_state, insertion, plan, &current);
                    if let Err(e) = self.check_position(link_state, &entry) {
                        self.state.abort_drive()?;
                        return Err(e);
                    }
                    if let Step::Stopped = self.command(Move::Position(entry), exit_speed).await? {
                        return Ok(DriveOutcome::Stopped);
                    }
                    self.state.set_at_entry_coordinate()?;
                    return Ok(DriveOutcome::Completed);
                }
                _ => return Err(self.reject("exit toward entry coordinate")),
            };
            if let Step::Stopped = step {
                return Ok(DriveOutcome::Stopped);
            }
            self.state.increment_insertion_cycle_state()?;
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn depth_targets(
        &self,
        link_state: &ManipulatorLinkState,
        plan: &InsertionPlan,
    ) -> DriveResult<DepthTargets> {
        let dura = self.session.dura_depth(&self.device_id)?.ok_or_else(|| {
            DriveError::Config(format!("no dura depth recorded for '{}'", link_state.id()))
        })?;
        let target = dura + plan.insertion_depth;
        Ok(DepthTargets {
            dura,
            near: target - self.speeds.near_target_distance,
            past: target + self.speeds.past_target_distance,
            target,
            margin: dura - self.speeds.dura_margin_distance,
        })
    }

    /// Device target that puts the tip on the entry coordinate, keeping the
    /// current depth-axis extension
    fn entry_position(
        &self,
        link_state: &ManipulatorLinkState,
        insertion: &Insertion,
        plan: &InsertionPlan,
        current: &DevicePosition,
    ) -> DevicePosition {
        let direction = insertion.direction_transformed();
        let axis = link_state.depth_axis();
        let extension = if link_state.num_axes() == 4 {
            current[axis]
                - link_state.zero_coordinate_offset()[axis]
                - link_state.brain_surface_offset()
        } else {
            0.0
        };
        link_state.transformed_to_device(&plan.entry_coordinate, &direction, extension)
    }

    fn check_depth(&self, link_state: &ManipulatorLinkState, depth: f64) -> DriveResult<()> {
        if link_state.depth_in_bounds(depth) {
            Ok(())
        } else {
            Err(DriveError::OutOfBounds {
                device_id: self.device_id.clone(),
                axis: link_state.depth_axis(),
                value: depth,
            })
        }
    }

    fn check_position(
        &self,
        link_state: &ManipulatorLinkState,
        position: &DevicePosition,
    ) -> DriveResult<()> {
        match link_state.out_of_bounds_axis(position) {
            None => Ok(()),
            Some((axis, value)) => Err(DriveError::OutOfBounds {
                device_id: self.device_id.clone(),
                axis,
                value,
            }),
        }
    }

    async fn begin_drive(&mut self, drive: &str) -> DriveResult<()> {
        self.stop.clear();
        let granted = match self
            .link
            .set_writable(&self.device_id, true, self.write_priority)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(DriveError::Link(LinkError::NotWritable(
                self.device_id.clone(),
            ))),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = granted {
            warn!(
                target: "neuroprobe-automation",
                "'{}' {} drive could not acquire write gate: {}", self.device_id, drive, e
            );
            if self.state.is_driving() {
                self.state.abort_drive()?;
            }
            return Err(e);
        }
        self.log(LogRecord::new(CATEGORY_AUTOMATION, "drive_started", &self.device_id).field(drive));
        Ok(())
    }

    /// Release the write gate and report the drive outcome
    ///
    /// A failed release does not change the outcome: the moves already
    /// happened and the state already reflects them. It is logged as
    /// `gate_release_failed` instead.
    async fn end_drive(
        &mut self,
        drive: &str,
        result: DriveResult<DriveOutcome>,
    ) -> DriveResult<DriveOutcome> {
        if let Err(e) = self
            .link
            .set_writable(&self.device_id, false, self.write_priority)
            .await
        {
            warn!(
                target: "neuroprobe-automation",
                "'{}' {} drive could not release write gate: {}", self.device_id, drive, e
            );
            self.log(
                LogRecord::new(CATEGORY_AUTOMATION, "gate_release_failed", &self.device_id)
                    .field(drive)
                    .field(&e),
            );
        }

        let event = match &result {
            Ok(DriveOutcome::Completed) => "drive_completed",
            Ok(DriveOutcome::Stopped) => "drive_stopped",
            Err(_) => "drive_failed",
        };
        let mut record = LogRecord::new(CATEGORY_AUTOMATION, event, &self.device_id)
            .field(drive)
            .field(self.state.state());
        if let Err(e) = &result {
            record = record.field(e);
            warn!(
                target: "neuroprobe-automation",
                "'{}' {} drive failed in {}: {}", self.device_id, drive, self.state.state(), e
            );
        } else {
            info!(
                target: "neuroprobe-automation",
                "'{}' {} drive {} in {}", self.device_id, drive, event, self.state.state()
            );
        }
        self.log(record);
        result
    }

    /// Issue one move and wait for it
    ///
    /// Nothing is sent once a stop has been requested.
    async fn command(&mut self, command: Move, speed: f64) -> DriveResult<Step> {
        if self.stop.is_requested() {
            debug!(
                target: "neuroprobe-automation",
                "'{}' stop pending, move not issued", self.device_id
            );
            return Ok(Step::Stopped);
        }
        let result = match command {
            Move::Depth(depth) => {
                self.log(
                    LogRecord::new(CATEGORY_AUTOMATION, "set_depth", &self.device_id)
                        .field(depth)
                        .field(speed),
                );
                self.link
                    .set_depth(&self.device_id, depth, speed)
                    .await
                    .map(|_| ())
            }
            Move::Position(position) => {
                self.log(
                    LogRecord::new(CATEGORY_AUTOMATION, "set_position", &self.device_id)
                        .field(format!("{:?}", position))
                        .field(speed),
                );
                self.link
                    .set_position(&self.device_id, position, speed)
                    .await
                    .map(|_| ())
            }
        };
        match result {
            Ok(()) if self.stop.is_requested() => Ok(Step::Stopped),
            Ok(()) => Ok(Step::Continue),
            Err(LinkError::Stopped(_)) => Ok(Step::Stopped),
            Err(e) => self.abort(e),
        }
    }

    async fn read_position(&mut self) -> DriveResult<DevicePosition> {
        match self.link.get_position(&self.device_id).await {
            Ok(position) => Ok(position),
            Err(e) => self.abort(e),
        }
    }

    async fn read_depth(&mut self, link_state: &ManipulatorLinkState) -> DriveResult<f64> {
        let position = self.read_position().await?;
        Ok(link_state.depth_reading(&position))
    }

    /// Fall back to the last landmark and surface the link error
    fn abort<T>(&mut self, error: LinkError) -> DriveResult<T> {
        if self.state.is_driving() {
            self.state.abort_drive()?;
        }
        Err(error.into())
    }

    fn reject(&self, requested: &'static str) -> DriveError {
        StateError::InvalidTransition {
            from: self.state.state(),
            requested,
        }
        .into()
    }

    fn log(&self, record: LogRecord) {
        self.output_log.append(record);
    }
}
