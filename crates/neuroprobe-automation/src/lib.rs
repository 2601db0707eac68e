// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# neuroprobe Automation

Drive orchestration for probe insertion.

## Architecture

```text
┌──────────────────────────────────────────────────────┐
│     CALLERS (simulate_insertion, UI, scripts)         │
└──────────────────────────┬───────────────────────────┘
                           ↓
┌──────────────────────────────────────────────────────┐
│              AUTOMATION LAYER (This Crate)            │
│  • DriveOrchestrator  - staged entry/insert/exit      │
│  • PositionEcho       - device → probe mirroring      │
│  • plan_entry         - surface search + clearance    │
│  • OutputLog          - append-only experiment log    │
└───────────┬──────────────────────────┬───────────────┘
            ↓                          ↓
  neuroprobe-state-manager     neuroprobe-link
  (insertion cycle)            (ManipulatorLink, offsets)
```

One [`ManipulatorSession`] is shared by every orchestrator and echo loop that
talks to the same link. Each orchestrator owns the insertion cycle of one
device and is the only writer of that device while a drive runs.

## Example

```rust,no_run
use std::sync::Arc;
use neuroprobe_automation::{DriveOrchestrator, ManipulatorSession, SpeedProfile};
use neuroprobe_link::{SimulatedManipulatorLink, SimulatorConfig};

# async fn run() -> Result<(), Box<dyn std::error::Error>> {
let link = SimulatedManipulatorLink::new(SimulatorConfig::default()).with_device("1", [10.0; 4]);
let session = Arc::new(ManipulatorSession::new(Arc::new(link)));
session.connect().await?;

let mut orchestrator = DriveOrchestrator::new("1", session, SpeedProfile::default())?;
orchestrator.calibrate_zero().await?;
# Ok(())
# }
```
*/

pub mod echo;
pub mod error;
pub mod orchestrator;
pub mod output_log;
pub mod plan;
pub mod session;
pub mod speed;

pub use echo::{EchoConfig, LogThrottle, PositionEcho, ProbePose};
pub use error::{DriveError, DriveResult};
pub use orchestrator::{DriveOrchestrator, DriveOutcome, StopHandle};
pub use output_log::{
    JsonLinesOutputLog, LogRecord, MemoryOutputLog, OutputLog, TracingOutputLog,
    CATEGORY_AUTOMATION, CATEGORY_POSITION,
};
pub use plan::{plan_entry, InsertionPlan};
pub use session::{DeviceRecord, ManipulatorSession};
pub use speed::SpeedProfile;
