// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-writer discipline for the SQLite layer.
//!
//! Every mutation in courier-storage funnels through the one
//! `tokio_rusqlite::Connection` owned by [`Database`](crate::Database).
//! tokio-rusqlite executes the submitted closures sequentially on one
//! background thread, so the queue pop transaction, delivery flips, and
//! process status guards never race each other and SQLITE_BUSY cannot
//! occur between writers inside this process.
//!
//! **Do NOT open a second Connection against the same file for writes.**
//! Query modules take `&Database` and go through `database.connection().call()`;
//! anything else bypasses the serialization this crate relies on.
