// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Contact, Delivery, DeliveryCounts, DeliveryStatus, ProcessRecord, SessionRecord,
};

/// Adapter for storage and persistence backends.
///
/// Storage adapters own the durable truth: session records, contacts,
/// processes, per-recipient deliveries, and the job queue. The in-memory
/// session registry is only a cache of live transport handles on top of
/// the `sessions` rows held here.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), CourierError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), CourierError>;

    // --- Session records ---

    /// Creates a session record. Fails with [`CourierError::Conflict`] when
    /// the owner already has a session for this phone number.
    async fn create_session(&self, record: &SessionRecord) -> Result<(), CourierError>;

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, CourierError>;

    /// The session an owner registered for a given phone, if any.
    async fn find_session_by_phone(
        &self,
        owner_id: &str,
        phone: &str,
    ) -> Result<Option<SessionRecord>, CourierError>;

    async fn list_sessions(&self, owner_id: Option<&str>)
        -> Result<Vec<SessionRecord>, CourierError>;

    /// Sessions whose durable record says ready, i.e. the resume set.
    async fn list_ready_sessions(&self) -> Result<Vec<SessionRecord>, CourierError>;

    /// Records a freshly issued challenge artifact and resets the scanned flag.
    async fn set_qr_issued(&self, id: &str, qr_path: &str) -> Result<(), CourierError>;

    /// Marks the session authenticated (and the challenge scanned).
    async fn set_session_authenticated(&self, id: &str) -> Result<(), CourierError>;

    /// Marks the session ready and stamps `last_seen_at`.
    async fn set_session_ready(&self, id: &str) -> Result<(), CourierError>;

    /// Clears the ready and authenticated flags after a disconnect.
    async fn set_session_disconnected(&self, id: &str) -> Result<(), CourierError>;

    async fn delete_session(&self, id: &str) -> Result<(), CourierError>;

    // --- Contacts ---

    async fn upsert_contact(&self, contact: &Contact) -> Result<(), CourierError>;

    async fn list_contacts(&self, owner_id: &str) -> Result<Vec<Contact>, CourierError>;

    /// Resolves contact ids to rows, scoped to `owner_id` so a job cannot
    /// reach another tenant's contacts. Results follow the order of `ids`;
    /// unknown or foreign ids are silently absent.
    async fn find_contacts(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> Result<Vec<Contact>, CourierError>;

    // --- Processes and deliveries ---

    /// Atomically creates the process row plus one pending delivery row per
    /// contact id. Either everything lands or nothing does.
    async fn create_process(
        &self,
        process: &ProcessRecord,
        contact_ids: &[String],
    ) -> Result<(), CourierError>;

    async fn get_process(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<ProcessRecord>, CourierError>;

    async fn list_processes(&self, owner_id: &str) -> Result<Vec<ProcessRecord>, CourierError>;

    /// pending → processing. Returns false if the process was not pending.
    async fn mark_processing(&self, id: &str) -> Result<bool, CourierError>;

    /// processing → completed, recording the final sent tally.
    async fn complete_process(&self, id: &str, sent_count: i64) -> Result<bool, CourierError>;

    /// {pending, processing} → failed.
    async fn fail_process(&self, id: &str) -> Result<bool, CourierError>;

    /// Flips one pending delivery to a terminal status. Returns false if the
    /// row was already terminal (a delivery is mutated at most once).
    async fn mark_delivery(
        &self,
        process_id: &str,
        contact_id: &str,
        status: DeliveryStatus,
    ) -> Result<bool, CourierError>;

    async fn list_deliveries(&self, process_id: &str) -> Result<Vec<Delivery>, CourierError>;

    async fn count_deliveries(&self, process_id: &str) -> Result<DeliveryCounts, CourierError>;

    // --- Durable job queue ---

    /// Appends a payload to the named FIFO queue.
    async fn queue_push(&self, queue_name: &str, payload: &str) -> Result<i64, CourierError>;

    /// Removes and returns the oldest payload, or `None` when empty.
    /// Atomic: a popped payload is gone (at-most-once delivery).
    async fn queue_pop(&self, queue_name: &str) -> Result<Option<String>, CourierError>;

    async fn queue_len(&self, queue_name: &str) -> Result<i64, CourierError>;
}
