// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# neuroprobe Manipulator Link

The boundary between drive logic and positioning hardware.

## Architecture

```text
┌──────────────────────────────────────────────────────┐
│              DRIVE LAYER (neuroprobe-automation)      │
└──────────────────────────┬───────────────────────────┘
                           ↓  ManipulatorLink (async)
┌──────────────────────────────────────────────────────┐
│              LINK LAYER (This Crate)                  │
│  • ManipulatorLink           - request/response trait │
│  • ManipulatorLinkState      - offsets and bounds     │
│  • SimulatedManipulatorLink  - in-process devices     │
└──────────────────────────┬───────────────────────────┘
                           ↓
              link server / serial bus / simulator
```

All link operations return [`LinkResult`]. Errors are never retried at this
layer; the drive layer decides what a failure means for the insertion cycle.
*/

pub mod impls;
pub mod link_state;
pub mod traits;
pub mod types;

pub use impls::{SimulatedManipulatorLink, SimulatorConfig};
pub use link_state::ManipulatorLinkState;
pub use traits::ManipulatorLink;
pub use types::*;
