// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Link trait definitions.
*/

pub mod manipulator_link;

pub use manipulator_link::ManipulatorLink;
