// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
In-process manipulator simulator.

Moves devices along straight lines at the commanded speed, records every
request, and can be told to fail the next request of a given kind. Used by
tests and the `simulate_insertion` tool in place of real hardware.
*/

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::traits::ManipulatorLink;
use crate::types::*;

/// Simulator behaviour
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Axis count reported for every device
    pub num_axes: u8,
    /// Travel range per axis, mm
    pub dimensions: DevicePosition,
    /// Wall-clock seconds per simulated second; 0 completes moves at once
    pub time_scale: f64,
    /// Interval between interpolated position updates
    pub step_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            num_axes: 4,
            dimensions: [20.0; 4],
            time_scale: 0.0,
            step_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone)]
struct SimulatedDevice {
    position: DevicePosition,
    writable: bool,
    /// Bumped by every stop; a move in flight halts when it changes
    stop_generation: u64,
}

#[derive(Debug, Clone)]
struct PendingFault {
    /// Matching requests still allowed to succeed before this fault fires
    remaining: usize,
    error: LinkError,
}

#[derive(Debug, Default)]
struct SimulatorState {
    devices: AHashMap<String, SimulatedDevice>,
    history: Vec<LinkCommand>,
    faults: AHashMap<CommandKind, VecDeque<PendingFault>>,
    unreachable: bool,
}

/// Simulated implementation of [`ManipulatorLink`]
pub struct SimulatedManipulatorLink {
    config: SimulatorConfig,
    state: Arc<RwLock<SimulatorState>>,
}

impl SimulatedManipulatorLink {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(SimulatorState::default())),
        }
    }

    /// Attach a device at a starting position
    pub fn with_device(self, id: impl Into<String>, position: DevicePosition) -> Self {
        self.add_device(id, position);
        self
    }

    pub fn add_device(&self, id: impl Into<String>, position: DevicePosition) {
        let id = id.into();
        debug!(target: "neuroprobe-link", "Simulator attached device '{}' at {:?}", id, position);
        self.state.write().devices.insert(
            id,
            SimulatedDevice {
                position,
                writable: false,
                stop_generation: 0,
            },
        );
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Current position without recording a request
    pub fn position(&self, id: &str) -> Option<DevicePosition> {
        self.state.read().devices.get(id).map(|d| d.position)
    }

    pub fn is_writable(&self, id: &str) -> bool {
        self.state
            .read()
            .devices
            .get(id)
            .is_some_and(|d| d.writable)
    }

    /// Every request received so far, in order
    pub fn history(&self) -> Vec<LinkCommand> {
        self.state.read().history.clone()
    }

    /// Only the move requests (`set_position` / `set_depth`)
    pub fn moves(&self) -> Vec<LinkCommand> {
        self.state
            .read()
            .history
            .iter()
            .filter(|c| c.is_move())
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.state.write().history.clear();
    }

    /// Fail the next request of `kind` with `error`
    ///
    /// Faults queue up per kind and fire in insertion order.
    pub fn inject_fault(&self, kind: CommandKind, error: LinkError) {
        self.inject_fault_after(kind, 0, error);
    }

    /// Let `successes` requests of `kind` through, then fail one with `error`
    pub fn inject_fault_after(&self, kind: CommandKind, successes: usize, error: LinkError) {
        self.state
            .write()
            .faults
            .entry(kind)
            .or_default()
            .push_back(PendingFault {
                remaining: successes,
                error,
            });
    }

    /// Make every request fail with `LinkError::Unreachable`
    pub fn set_reachable(&self, reachable: bool) {
        self.state.write().unreachable = !reachable;
    }

    /// Record the request and apply reachability and injected faults
    fn begin(&self, command: LinkCommand) -> LinkResult<()> {
        let kind = command.kind();
        let mut state = self.state.write();
        state.history.push(command);
        if state.unreachable {
            return Err(LinkError::Unreachable("simulator offline".to_string()));
        }
        let Some(queue) = state.faults.get_mut(&kind) else {
            return Ok(());
        };
        let fire = match queue.front_mut() {
            Some(fault) if fault.remaining > 0 => {
                fault.remaining -= 1;
                false
            }
            Some(_) => true,
            None => false,
        };
        if !fire {
            return Ok(());
        }
        match queue.pop_front() {
            Some(fault) => {
                warn!(target: "neuroprobe-link", "Injected fault on {:?}: {}", kind, fault.error);
                Err(fault.error)
            }
            None => Ok(()),
        }
    }

    fn device<R>(&self, id: &str, f: impl FnOnce(&mut SimulatedDevice) -> R) -> LinkResult<R> {
        let mut state = self.state.write();
        let device = state
            .devices
            .get_mut(id)
            .ok_or_else(|| LinkError::UnknownDevice(id.to_string()))?;
        Ok(f(device))
    }

    fn check_move(&self, id: &str, target: &DevicePosition, speed: f64) -> LinkResult<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(LinkError::WriteRejected {
                id: id.to_string(),
                reason: format!("speed must be positive, got {speed}"),
            });
        }
        if !self.device(id, |d| d.writable)? {
            return Err(LinkError::NotWritable(id.to_string()));
        }
        let axes = usize::from(self.config.num_axes);
        if let Some(axis) = (0..axes)
            .find(|a| !(0.0..=self.config.dimensions[*a]).contains(&target[*a]))
        {
            return Err(LinkError::WriteRejected {
                id: id.to_string(),
                reason: format!("axis {axis} target {} outside travel", target[axis]),
            });
        }
        Ok(())
    }

    /// Interpolate from the current position to `target`
    async fn travel(
        &self,
        id: &str,
        target: DevicePosition,
        speed: f64,
    ) -> LinkResult<DevicePosition> {
        let (start, generation) = self.device(id, |d| (d.position, d.stop_generation))?;
        let distance = start
            .iter()
            .zip(target.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();
        let wall_seconds = distance / speed * self.config.time_scale;

        if wall_seconds <= 0.0 {
            self.device(id, |d| d.position = target)?;
            return Ok(target);
        }

        let steps = (wall_seconds / self.config.step_interval.as_secs_f64())
            .ceil()
            .max(1.0) as u32;
        for step in 1..=steps {
            tokio::time::sleep(self.config.step_interval).await;
            let t = f64::from(step) / f64::from(steps);
            let halted = self.device(id, |d| {
                if d.stop_generation != generation {
                    return true;
                }
                for axis in 0..4 {
                    d.position[axis] = start[axis] + (target[axis] - start[axis]) * t;
                }
                false
            })?;
            if halted {
                info!(target: "neuroprobe-link", "Move of '{}' halted by stop", id);
                return Err(LinkError::Stopped(id.to_string()));
            }
        }
        Ok(target)
    }
}

#[async_trait]
impl ManipulatorLink for SimulatedManipulatorLink {
    async fn get_manipulators(&self) -> LinkResult<ManipulatorInventory> {
        self.begin(LinkCommand::GetManipulators)?;
        let mut ids: Vec<String> = self.state.read().devices.keys().cloned().collect();
        ids.sort();
        Ok(ManipulatorInventory {
            ids,
            num_axes: self.config.num_axes,
            dimensions: self.config.dimensions,
        })
    }

    async fn get_position(&self, id: &str) -> LinkResult<DevicePosition> {
        self.begin(LinkCommand::GetPosition { id: id.to_string() })?;
        self.device(id, |d| d.position)
    }

    async fn set_position(
        &self,
        id: &str,
        position: DevicePosition,
        speed: f64,
    ) -> LinkResult<DevicePosition> {
        self.begin(LinkCommand::SetPosition {
            id: id.to_string(),
            position,
            speed,
        })?;
        let mut target = position;
        if self.config.num_axes == 3 {
            target[3] = target[2];
        }
        self.check_move(id, &target, speed)?;
        debug!(target: "neuroprobe-link", "'{}' set_position {:?} @ {} mm/s", id, target, speed);
        self.travel(id, target, speed).await
    }

    async fn set_depth(&self, id: &str, depth: f64, speed: f64) -> LinkResult<f64> {
        self.begin(LinkCommand::SetDepth {
            id: id.to_string(),
            depth,
            speed,
        })?;
        let axis = if self.config.num_axes == 4 { 3 } else { 2 };
        let mut target = self.device(id, |d| d.position)?;
        target[axis] = depth;
        if self.config.num_axes == 3 {
            target[3] = depth;
        }
        self.check_move(id, &target, speed)?;
        debug!(target: "neuroprobe-link", "'{}' set_depth {} @ {} mm/s", id, depth, speed);
        let reached = self.travel(id, target, speed).await?;
        Ok(reached[axis])
    }

    async fn set_writable(&self, id: &str, writable: bool, priority: f64) -> LinkResult<bool> {
        self.begin(LinkCommand::SetWritable {
            id: id.to_string(),
            writable,
            priority,
        })?;
        self.device(id, |d| {
            d.writable = writable;
            d.writable
        })
    }

    async fn stop(&self, id: &str) -> LinkResult<()> {
        self.begin(LinkCommand::Stop { id: id.to_string() })?;
        self.device(id, |d| d.stop_generation += 1)
    }
}
