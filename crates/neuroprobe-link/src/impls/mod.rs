// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Link implementations.
*/

pub mod simulated_link;

pub use simulated_link::{SimulatedManipulatorLink, SimulatorConfig};
