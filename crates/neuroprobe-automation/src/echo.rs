// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Position echo: mirrors a device's position onto its probe.
//!
//! Polls `get_position`, applies the device's offsets, converts
//! device → transformed → atlas → world and publishes the result on a
//! `watch` channel. Log records are dead-band filtered and rate limited.
//!
//! The loop ends when its [`PositionEcho`] is stopped, the pose receiver is
//! dropped, the device is deregistered, or the link fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use neuroprobe_coordinates::{Insertion, Vector3};
use neuroprobe_link::DevicePosition;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::{DriveError, DriveResult};
use crate::output_log::{LogRecord, OutputLog, CATEGORY_POSITION};
use crate::session::ManipulatorSession;

/// Echo loop timing and log filtering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoConfig {
    pub poll_interval: Duration,
    /// Upper bound on position records per second
    pub log_rate_hz: f64,
    /// Smallest per-axis change (mm) worth a log record
    pub dead_band: f64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            log_rate_hz: 4.0,
            dead_band: 0.001,
        }
    }
}

/// One echoed probe position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbePose {
    pub device_position: DevicePosition,
    pub transformed: Vector3<f64>,
    pub atlas: Vector3<f64>,
    pub world: Vector3<f64>,
}

impl ProbePose {
    /// Apply offsets and walk the coordinate pipeline
    pub fn from_device(
        device_position: DevicePosition,
        link_state: &neuroprobe_link::ManipulatorLinkState,
        insertion: &Insertion,
    ) -> Self {
        let direction = insertion.direction_transformed();
        let transformed = link_state.device_to_transformed(&device_position, &direction);
        let atlas = insertion.transform().transformed_to_space(&transformed);
        let world = insertion.space().space_to_world(&atlas);
        Self {
            device_position,
            transformed,
            atlas,
            world,
        }
    }
}

/// Dead-band and rate filter for position records
#[derive(Debug, Clone)]
pub struct LogThrottle {
    min_interval: Duration,
    dead_band: f64,
    last_position: Option<DevicePosition>,
    last_at: Option<Instant>,
}

impl LogThrottle {
    pub fn new(log_rate_hz: f64, dead_band: f64) -> Self {
        let min_interval = if log_rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / log_rate_hz)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            dead_band,
            last_position: None,
            last_at: None,
        }
    }

    /// True if `position` at `now` should be logged; records it if so
    pub fn admit(&mut self, position: &DevicePosition, now: Instant) -> bool {
        if let Some(last) = &self.last_position {
            let moved = last
                .iter()
                .zip(position.iter())
                .any(|(a, b)| (a - b).abs() >= self.dead_band);
            if !moved {
                return false;
            }
        }
        if let Some(at) = self.last_at {
            if now.duration_since(at) < self.min_interval {
                return false;
            }
        }
        self.last_position = Some(*position);
        self.last_at = Some(now);
        true
    }
}

/// Handle to a running echo loop
pub struct PositionEcho {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PositionEcho {
    /// Start echoing `device_id` onto `insertion`
    ///
    /// # Errors
    ///
    /// Returns `DriveError::NotRegistered` if the session does not know the device.
    pub fn spawn(
        session: Arc<ManipulatorSession>,
        device_id: impl Into<String>,
        insertion: Insertion,
        config: EchoConfig,
        output_log: Arc<dyn OutputLog>,
    ) -> DriveResult<(Self, watch::Receiver<Option<ProbePose>>)> {
        let device_id = device_id.into();
        if !session.is_registered(&device_id) {
            return Err(DriveError::NotRegistered(device_id));
        }
        let (sender, receiver) = watch::channel(None);
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(echo_loop(
            session,
            device_id,
            insertion,
            config,
            output_log,
            sender,
            Arc::clone(&running),
        ));
        Ok((Self { running, task }, receiver))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.task.is_finished()
    }

    /// Ask the loop to end after its current poll
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Stop and wait for the loop to end
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!(target: "neuroprobe-automation", "Echo task ended abnormally: {}", e);
        }
    }
}

async fn echo_loop(
    session: Arc<ManipulatorSession>,
    device_id: String,
    insertion: Insertion,
    config: EchoConfig,
    output_log: Arc<dyn OutputLog>,
    sender: watch::Sender<Option<ProbePose>>,
    running: Arc<AtomicBool>,
) {
    debug!(target: "neuroprobe-automation", "Echo started for '{}'", device_id);
    let link = session.link();
    let mut throttle = LogThrottle::new(config.log_rate_hz, config.dead_band);
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while running.load(Ordering::Relaxed) {
        ticker.tick().await;
        if !running.load(Ordering::Relaxed) {
            break;
        }

        let position = match link.get_position(&device_id).await {
            Ok(position) => position,
            Err(e) => {
                warn!(target: "neuroprobe-automation", "Echo for '{}' lost the link: {}", device_id, e);
                break;
            }
        };
        // Offsets may change between polls
        let link_state = match session.link_state(&device_id) {
            Ok(link_state) => link_state,
            Err(_) => break,
        };

        let pose = ProbePose::from_device(position, &link_state, &insertion);
        if sender.send(Some(pose)).is_err() {
            break;
        }

        if throttle.admit(&position, Instant::now()) {
            output_log.append(
                LogRecord::new(CATEGORY_POSITION, "position", &device_id)
                    .field(position[0])
                    .field(position[1])
                    .field(position[2])
                    .field(position[3])
                    .field(pose.world.x)
                    .field(pose.world.y)
                    .field(pose.world.z),
            );
        }
    }

    running.store(false, Ordering::Relaxed);
    debug!(target: "neuroprobe-automation", "Echo stopped for '{}'", device_id);
}
