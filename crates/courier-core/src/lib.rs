// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier bulk-messaging dispatch daemon.
//!
//! This crate provides the foundational trait definitions, error type, and
//! domain types used throughout the Courier workspace. The transport and
//! storage backends implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    AdapterType, BulkJob, Contact, Delivery, DeliveryCounts, DeliveryStatus, HealthStatus,
    ProcessRecord, ProcessStatus, SessionRecord, SessionState, TransportEvent,
};

pub use traits::{PluginAdapter, StorageAdapter, TransportClient};
