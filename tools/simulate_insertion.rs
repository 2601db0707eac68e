// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Full insertion cycle against the simulated manipulator.
//!
//! Loads `neuroprobe_configuration.toml` (or defaults), plans an entry
//! coordinate on a synthetic ellipsoid brain, then zeroes, drives to entry,
//! lowers onto the dura, inserts and retracts while echoing the probe pose.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use neuroprobe::config::{self, ConfigError, NeuroprobeConfig};
use neuroprobe::observability::{self, CrateDebugFlags};
use neuroprobe::prelude::*;
use neuroprobe::link::{DevicePosition, SimulatorConfig};
use neuroprobe::{automation, setup};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Simulated probe insertion
#[derive(Parser, Debug)]
#[command(name = "simulate_insertion", version, long_about = None)]
struct Args {
    /// Configuration file (default: search for neuroprobe_configuration.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target, transformed AP/ML/DV in mm
    #[arg(long, value_delimiter = ',', default_values_t = [1.0, 1.0, 3.5], allow_negative_numbers = true)]
    target: Vec<f64>,

    /// Probe yaw, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    yaw: f64,

    /// Probe pitch from vertical, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pitch: f64,

    /// Probe spin about its shank, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    spin: f64,

    /// Override manipulator.num_axes
    #[arg(long)]
    num_axes: Option<u8>,

    /// Override manipulator.time_scale (0 moves instantly)
    #[arg(long)]
    time_scale: Option<f64>,

    /// Write the experiment log as JSON lines to this file
    #[arg(long)]
    output_log: Option<PathBuf>,

    /// Enable debug logging for crates ("all" or comma-separated names)
    #[arg(long)]
    debug: Option<String>,
}

/// Label volume with one ellipsoid "brain" filling most of the grid
struct EllipsoidBrain {
    dimensions: Vector3<f64>,
    center: Vector3<f64>,
    semi_axes: Vector3<f64>,
}

impl EllipsoidBrain {
    fn new(dimensions: Vector3<f64>) -> Self {
        Self {
            dimensions,
            center: dimensions / 2.0,
            semi_axes: dimensions * 0.4,
        }
    }
}

impl LabelVolume for EllipsoidBrain {
    fn label_at(&self, index: &Vector3<f64>) -> i32 {
        let offset = (index - self.center).component_div(&self.semi_axes);
        i32::from(offset.norm_squared() <= 1.0)
    }

    fn index_dimensions(&self) -> Vector3<f64> {
        self.dimensions
    }
}

fn load(args: &Args) -> Result<NeuroprobeConfig> {
    let mut overrides = HashMap::new();
    if let Some(num_axes) = args.num_axes {
        overrides.insert("num_axes".to_string(), num_axes.to_string());
    }
    if let Some(time_scale) = args.time_scale {
        overrides.insert("time_scale".to_string(), time_scale.to_string());
    }
    if let Some(path) = &args.output_log {
        overrides.insert("output_log".to_string(), path.display().to_string());
    }

    let config = match config::load_config(args.config.as_deref(), Some(&overrides)) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(_)) if args.config.is_none() => {
            let mut config = NeuroprobeConfig::default();
            config::apply_environment_overrides(&mut config)?;
            config::apply_cli_overrides(&mut config, &overrides)?;
            config
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };
    config::validate_config(&config)?;
    Ok(config)
}

fn debug_flags(args: &Args) -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::default();
    if let Ok(value) = std::env::var("NEUROPROBE_DEBUG") {
        flags.merge_env_value(&value);
    }
    if let Some(value) = &args.debug {
        flags.merge_env_value(value);
    }
    flags
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load(&args)?;
    let flags = debug_flags(&args);

    #[cfg(feature = "file-logging")]
    let _logging_guard = if config.logging.file_logging {
        Some(observability::init_logging(
            &flags,
            &config.system.log_level,
            &config.logging.log_dir,
            config.logging.retention_days,
            config.logging.retention_runs,
        )?)
    } else {
        observability::init_console_logging(&flags, &config.system.log_level)?;
        None
    };
    #[cfg(not(feature = "file-logging"))]
    observability::init_console_logging(&flags, &config.system.log_level)?;

    run(&args, &config).await
}

async fn run(args: &Args, config: &NeuroprobeConfig) -> Result<()> {
    let space = Arc::new(setup::coordinate_space(&config.atlas)?);
    let transform = Arc::new(setup::manipulator_transform(&config.manipulator)?);
    let brain = EllipsoidBrain::new(space.index_dimensions());

    let &[ap, ml, dv] = args.target.as_slice() else {
        bail!("--target takes three values: AP,ML,DV");
    };
    let target = Vector3::new(ap, ml, dv);
    let insertion = Insertion::new(
        target,
        InsertionAngles::new(args.yaw, args.pitch, args.spin),
        Arc::clone(&space),
        transform,
    );
    let plan = plan_entry(
        &insertion,
        &brain,
        &setup::surface_finder(&config.surface),
        config.automation.entry_clearance,
    )?;
    info!(
        "Planned insertion: entry {:?}, surface {:?}, depth {:.3} mm",
        plan.entry_coordinate.as_slice(),
        plan.surface_coordinate.as_slice(),
        plan.insertion_depth
    );

    // Device parked mid-travel
    let simulator: SimulatorConfig = setup::simulator_config(&config.manipulator);
    let park: DevicePosition = simulator.dimensions.map(|d| d / 2.0);
    let sim = Arc::new(SimulatedManipulatorLink::new(simulator).with_device("1", park));
    let session = Arc::new(ManipulatorSession::new(sim.clone()));
    let device_ids = session.connect().await?;
    let Some(device_id) = device_ids.first().cloned() else {
        bail!("Simulator reported no manipulators");
    };

    let output_log: Arc<dyn OutputLog> = if config.logging.output_log.as_os_str().is_empty() {
        Arc::new(automation::TracingOutputLog)
    } else {
        Arc::new(
            automation::JsonLinesOutputLog::create(&config.logging.output_log).with_context(
                || format!("Failed to open {}", config.logging.output_log.display()),
            )?,
        )
    };

    let mut orchestrator = DriveOrchestrator::new(
        device_id.clone(),
        Arc::clone(&session),
        setup::speed_profile(&config.automation),
    )?
    .with_write_priority(config.automation.write_priority)
    .with_output_log(Arc::clone(&output_log));

    let mut events = orchestrator.subscribe_state();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("State: {:?}", event),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} state events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping manipulator");
            if let Err(e) = stop.stop().await {
                warn!("Stop failed: {}", e);
            }
        }
    });

    orchestrator.calibrate_zero().await?;
    let (echo, poses) = PositionEcho::spawn(
        Arc::clone(&session),
        device_id.clone(),
        insertion.clone(),
        setup::echo_config(&config.echo),
        Arc::clone(&output_log),
    )?;

    if orchestrator.drive_to_entry(&insertion, &plan).await? == DriveOutcome::Stopped {
        echo.shutdown().await;
        bail!("Stopped before reaching the entry coordinate");
    }

    lower_to_surface(&sim, &session, &device_id, &insertion, &plan, config).await?;
    orchestrator
        .reset_dura(&insertion, &plan.surface_coordinate)
        .await?;

    for drive in ["insert", "exit"] {
        let outcome = match drive {
            "insert" => orchestrator.drive_to_target(&plan).await?,
            _ => orchestrator.drive_out(&insertion, &plan).await?,
        };
        if outcome == DriveOutcome::Stopped {
            warn!("{} drive stopped in {}", drive, orchestrator.automation_state());
            break;
        }
        if let Some(pose) = *poses.borrow() {
            info!(
                "After {}: tip at atlas {:?}, world {:?}",
                drive,
                pose.atlas.as_slice(),
                pose.world.as_slice()
            );
        }
    }

    echo.shutdown().await;
    info!("Finished in {}", orchestrator.automation_state());
    Ok(())
}

/// Stand-in for the operator lowering the shank onto the dura by hand
async fn lower_to_surface(
    sim: &SimulatedManipulatorLink,
    session: &ManipulatorSession,
    device_id: &str,
    insertion: &Insertion,
    plan: &InsertionPlan,
    config: &NeuroprobeConfig,
) -> Result<()> {
    let link_state = session.link_state(device_id)?;
    let current = sim.get_position(device_id).await?;
    let direction = insertion.direction_transformed();
    let speed = setup::speed_profile(&config.automation).exit_speed(plan.insertion_depth)?;

    sim.set_writable(device_id, true, config.automation.write_priority)
        .await?;
    let moved = if link_state.num_axes() == 4 {
        let clearance = (plan.surface_coordinate - plan.entry_coordinate).norm();
        sim.set_depth(device_id, current[3] + clearance, speed)
            .await
            .map(|_| ())
    } else {
        let surface = link_state.transformed_to_device(&plan.surface_coordinate, &direction, 0.0);
        sim.set_position(device_id, surface, speed).await.map(|_| ())
    };
    sim.set_writable(device_id, false, config.automation.write_priority)
        .await?;
    moved?;
    Ok(())
}
