// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking facade over the durable queue.
//!
//! Durability lives in the storage rows; this type only adds the wakeup.
//! `pop` re-checks storage before every wait, so a backlog left over from a
//! previous run drains without any push happening in this one.

use std::sync::Arc;

use courier_core::types::BulkJob;
use courier_core::{CourierError, StorageAdapter};
use tokio::sync::Notify;
use tracing::warn;

/// Handle to one named durable FIFO queue.
///
/// Clones share the wakeup, so any number of producers can feed the single
/// consumer.
#[derive(Clone)]
pub struct JobQueue {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    queue_name: String,
    notify: Arc<Notify>,
}

impl JobQueue {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>, queue_name: &str) -> Self {
        Self {
            storage,
            queue_name: queue_name.to_string(),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Persist a job and wake the consumer. Returns the queue row id.
    pub async fn push(&self, job: &BulkJob) -> Result<i64, CourierError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| CourierError::Internal(format!("cannot serialize job: {e}")))?;
        let id = self.storage.queue_push(&self.queue_name, &payload).await?;
        self.notify.notify_one();
        Ok(id)
    }

    /// Take the oldest job, waiting if the queue is empty.
    ///
    /// A payload that fails to deserialize is discarded with a warning; the
    /// queue row is already gone and replaying it could never succeed.
    pub async fn pop(&self) -> Result<BulkJob, CourierError> {
        loop {
            // Arm the wakeup before checking, so a push between the check
            // and the wait is not lost.
            let notified = self.notify.notified();
            match self.storage.queue_pop(&self.queue_name).await? {
                Some(payload) => match serde_json::from_str::<BulkJob>(&payload) {
                    Ok(job) => return Ok(job),
                    Err(e) => {
                        warn!(queue = self.queue_name, error = %e, "discarding malformed payload");
                    }
                },
                None => notified.await,
            }
        }
    }

    /// Jobs currently waiting.
    pub async fn len(&self) -> Result<i64, CourierError> {
        self.storage.queue_len(&self.queue_name).await
    }
}
