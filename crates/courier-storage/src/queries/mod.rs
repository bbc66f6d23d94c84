// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod contacts;
pub mod deliveries;
pub mod processes;
pub mod queue;
pub mod sessions;
