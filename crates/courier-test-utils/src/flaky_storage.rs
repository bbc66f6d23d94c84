// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage wrapper with per-operation failure injection.
//!
//! `FlakyStorage` delegates to a real adapter but fails any operation whose
//! name was armed via [`fail_operation`](FlakyStorage::fail_operation).
//! Useful for exercising the paths where persistence gives out mid-job.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::traits::adapter::PluginAdapter;
use courier_core::traits::storage::StorageAdapter;
use courier_core::types::{
    AdapterType, Contact, Delivery, DeliveryCounts, DeliveryStatus, HealthStatus, ProcessRecord,
    SessionRecord,
};
use courier_core::CourierError;

/// A storage adapter whose operations can be made to fail by name.
pub struct FlakyStorage {
    inner: Arc<dyn StorageAdapter + Send + Sync>,
    failing: Mutex<HashSet<String>>,
}

impl FlakyStorage {
    pub fn wrap(inner: Arc<dyn StorageAdapter + Send + Sync>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Arm an operation (by trait method name) to fail from now on.
    pub async fn fail_operation(&self, op: &str) {
        self.failing.lock().await.insert(op.to_string());
    }

    /// Disarm a previously armed operation.
    pub async fn restore_operation(&self, op: &str) {
        self.failing.lock().await.remove(op);
    }

    async fn trip(&self, op: &str) -> Result<(), CourierError> {
        if self.failing.lock().await.contains(op) {
            return Err(CourierError::Storage {
                source: format!("injected {op} failure").into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FlakyStorage {
    fn name(&self) -> &str {
        "flaky-storage"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        self.trip("health_check").await?;
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.trip("shutdown").await?;
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StorageAdapter for FlakyStorage {
    async fn initialize(&self) -> Result<(), CourierError> {
        self.trip("initialize").await?;
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.trip("close").await?;
        self.inner.close().await
    }

    async fn create_session(&self, record: &SessionRecord) -> Result<(), CourierError> {
        self.trip("create_session").await?;
        self.inner.create_session(record).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, CourierError> {
        self.trip("get_session").await?;
        self.inner.get_session(id).await
    }

    async fn find_session_by_phone(
        &self,
        owner_id: &str,
        phone: &str,
    ) -> Result<Option<SessionRecord>, CourierError> {
        self.trip("find_session_by_phone").await?;
        self.inner.find_session_by_phone(owner_id, phone).await
    }

    async fn list_sessions(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<SessionRecord>, CourierError> {
        self.trip("list_sessions").await?;
        self.inner.list_sessions(owner_id).await
    }

    async fn list_ready_sessions(&self) -> Result<Vec<SessionRecord>, CourierError> {
        self.trip("list_ready_sessions").await?;
        self.inner.list_ready_sessions().await
    }

    async fn set_qr_issued(&self, id: &str, qr_path: &str) -> Result<(), CourierError> {
        self.trip("set_qr_issued").await?;
        self.inner.set_qr_issued(id, qr_path).await
    }

    async fn set_session_authenticated(&self, id: &str) -> Result<(), CourierError> {
        self.trip("set_session_authenticated").await?;
        self.inner.set_session_authenticated(id).await
    }

    async fn set_session_ready(&self, id: &str) -> Result<(), CourierError> {
        self.trip("set_session_ready").await?;
        self.inner.set_session_ready(id).await
    }

    async fn set_session_disconnected(&self, id: &str) -> Result<(), CourierError> {
        self.trip("set_session_disconnected").await?;
        self.inner.set_session_disconnected(id).await
    }

    async fn delete_session(&self, id: &str) -> Result<(), CourierError> {
        self.trip("delete_session").await?;
        self.inner.delete_session(id).await
    }

    async fn upsert_contact(&self, contact: &Contact) -> Result<(), CourierError> {
        self.trip("upsert_contact").await?;
        self.inner.upsert_contact(contact).await
    }

    async fn list_contacts(&self, owner_id: &str) -> Result<Vec<Contact>, CourierError> {
        self.trip("list_contacts").await?;
        self.inner.list_contacts(owner_id).await
    }

    async fn find_contacts(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> Result<Vec<Contact>, CourierError> {
        self.trip("find_contacts").await?;
        self.inner.find_contacts(owner_id, ids).await
    }

    async fn create_process(
        &self,
        process: &ProcessRecord,
        contact_ids: &[String],
    ) -> Result<(), CourierError> {
        self.trip("create_process").await?;
        self.inner.create_process(process, contact_ids).await
    }

    async fn get_process(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<ProcessRecord>, CourierError> {
        self.trip("get_process").await?;
        self.inner.get_process(owner_id, id).await
    }

    async fn list_processes(&self, owner_id: &str) -> Result<Vec<ProcessRecord>, CourierError> {
        self.trip("list_processes").await?;
        self.inner.list_processes(owner_id).await
    }

    async fn mark_processing(&self, id: &str) -> Result<bool, CourierError> {
        self.trip("mark_processing").await?;
        self.inner.mark_processing(id).await
    }

    async fn complete_process(&self, id: &str, sent_count: i64) -> Result<bool, CourierError> {
        self.trip("complete_process").await?;
        self.inner.complete_process(id, sent_count).await
    }

    async fn fail_process(&self, id: &str) -> Result<bool, CourierError> {
        self.trip("fail_process").await?;
        self.inner.fail_process(id).await
    }

    async fn mark_delivery(
        &self,
        process_id: &str,
        contact_id: &str,
        status: DeliveryStatus,
    ) -> Result<bool, CourierError> {
        self.trip("mark_delivery").await?;
        self.inner.mark_delivery(process_id, contact_id, status).await
    }

    async fn list_deliveries(&self, process_id: &str) -> Result<Vec<Delivery>, CourierError> {
        self.trip("list_deliveries").await?;
        self.inner.list_deliveries(process_id).await
    }

    async fn count_deliveries(&self, process_id: &str) -> Result<DeliveryCounts, CourierError> {
        self.trip("count_deliveries").await?;
        self.inner.count_deliveries(process_id).await
    }

    async fn queue_push(&self, queue_name: &str, payload: &str) -> Result<i64, CourierError> {
        self.trip("queue_push").await?;
        self.inner.queue_push(queue_name, payload).await
    }

    async fn queue_pop(&self, queue_name: &str) -> Result<Option<String>, CourierError> {
        self.trip("queue_pop").await?;
        self.inner.queue_pop(queue_name).await
    }

    async fn queue_len(&self, queue_name: &str) -> Result<i64, CourierError> {
        self.trip("queue_len").await?;
        self.inner.queue_len(queue_name).await
    }
}
