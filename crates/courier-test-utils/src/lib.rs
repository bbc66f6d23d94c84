// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles for the Courier workspace.
//!
//! `MockTransport` stands in for the device bridge in session, worker, and
//! integration tests: scripted handshake events, per-phone send failures,
//! and a captured send log. `FlakyStorage` wraps a real storage adapter
//! with per-operation failure injection.

pub mod flaky_storage;
pub mod mock_transport;

pub use flaky_storage::FlakyStorage;
pub use mock_transport::{MockTransport, SentMessage};
