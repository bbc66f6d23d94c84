// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use courier_config::model::StorageConfig;
use courier_core::types::{
    Contact, Delivery, DeliveryCounts, DeliveryStatus, ProcessRecord, SessionRecord,
};
use courier_core::{AdapterType, CourierError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates every operation to the typed
/// query modules. The database is lazily opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`]
    /// is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, CourierError> {
        self.db.get().ok_or_else(|| CourierError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        // Checkpoint if the DB was ever opened; the connection itself is
        // closed when the adapter is dropped.
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(crate::database::map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), CourierError> {
        let db =
            Database::open_with_wal(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| CourierError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CourierError> {
        let db = self.db()?;
        // Checkpoint WAL; the actual connection closes on drop.
        db.connection()
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Session records ---

    async fn create_session(&self, record: &SessionRecord) -> Result<(), CourierError> {
        queries::sessions::create_session(self.db()?, record).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, CourierError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn find_session_by_phone(
        &self,
        owner_id: &str,
        phone: &str,
    ) -> Result<Option<SessionRecord>, CourierError> {
        queries::sessions::find_by_owner_and_phone(self.db()?, owner_id, phone).await
    }

    async fn list_sessions(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<SessionRecord>, CourierError> {
        queries::sessions::list_sessions(self.db()?, owner_id).await
    }

    async fn list_ready_sessions(&self) -> Result<Vec<SessionRecord>, CourierError> {
        queries::sessions::list_ready_sessions(self.db()?).await
    }

    async fn set_qr_issued(&self, id: &str, qr_path: &str) -> Result<(), CourierError> {
        queries::sessions::set_qr_issued(self.db()?, id, qr_path).await
    }

    async fn set_session_authenticated(&self, id: &str) -> Result<(), CourierError> {
        queries::sessions::set_authenticated(self.db()?, id).await
    }

    async fn set_session_ready(&self, id: &str) -> Result<(), CourierError> {
        queries::sessions::set_ready(self.db()?, id).await
    }

    async fn set_session_disconnected(&self, id: &str) -> Result<(), CourierError> {
        queries::sessions::set_disconnected(self.db()?, id).await
    }

    async fn delete_session(&self, id: &str) -> Result<(), CourierError> {
        queries::sessions::delete_session(self.db()?, id).await
    }

    // --- Contacts ---

    async fn upsert_contact(&self, contact: &Contact) -> Result<(), CourierError> {
        queries::contacts::upsert_contact(self.db()?, contact).await
    }

    async fn list_contacts(&self, owner_id: &str) -> Result<Vec<Contact>, CourierError> {
        queries::contacts::list_contacts(self.db()?, owner_id).await
    }

    async fn find_contacts(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> Result<Vec<Contact>, CourierError> {
        queries::contacts::find_contacts(self.db()?, owner_id, ids).await
    }

    // --- Processes and deliveries ---

    async fn create_process(
        &self,
        process: &ProcessRecord,
        contact_ids: &[String],
    ) -> Result<(), CourierError> {
        queries::processes::create_process(self.db()?, process, contact_ids).await
    }

    async fn get_process(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<ProcessRecord>, CourierError> {
        queries::processes::get_process(self.db()?, owner_id, id).await
    }

    async fn list_processes(&self, owner_id: &str) -> Result<Vec<ProcessRecord>, CourierError> {
        queries::processes::list_processes(self.db()?, owner_id).await
    }

    async fn mark_processing(&self, id: &str) -> Result<bool, CourierError> {
        queries::processes::mark_processing(self.db()?, id).await
    }

    async fn complete_process(&self, id: &str, sent_count: i64) -> Result<bool, CourierError> {
        queries::processes::complete_process(self.db()?, id, sent_count).await
    }

    async fn fail_process(&self, id: &str) -> Result<bool, CourierError> {
        queries::processes::fail_process(self.db()?, id).await
    }

    async fn mark_delivery(
        &self,
        process_id: &str,
        contact_id: &str,
        status: DeliveryStatus,
    ) -> Result<bool, CourierError> {
        queries::deliveries::mark_delivery(self.db()?, process_id, contact_id, status).await
    }

    async fn list_deliveries(&self, process_id: &str) -> Result<Vec<Delivery>, CourierError> {
        queries::deliveries::list_deliveries(self.db()?, process_id).await
    }

    async fn count_deliveries(&self, process_id: &str) -> Result<DeliveryCounts, CourierError> {
        queries::deliveries::count_deliveries(self.db()?, process_id).await
    }

    // --- Durable job queue ---

    async fn queue_push(&self, queue_name: &str, payload: &str) -> Result<i64, CourierError> {
        queries::queue::push(self.db()?, queue_name, payload).await
    }

    async fn queue_pop(&self, queue_name: &str) -> Result<Option<String>, CourierError> {
        queries::queue::pop(self.db()?, queue_name).await
    }

    async fn queue_len(&self, queue_name: &str) -> Result<i64, CourierError> {
        queries::queue::len(self.db()?, queue_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        let result = storage.initialize().await;
        assert!(result.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        let result = storage.health_check().await;
        assert!(result.is_err(), "health_check should fail before initialize");
    }

    #[tokio::test]
    async fn health_check_returns_healthy_when_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        let status = storage.health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn full_dispatch_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        // Register a session and drive it ready.
        let session = SessionRecord {
            id: "sess-1".to_string(),
            owner_id: "owner-1".to_string(),
            phone: "+15550001".to_string(),
            name: "primary".to_string(),
            qr_path: None,
            qr_scanned: false,
            authenticated: false,
            ready: false,
            last_seen_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        storage.create_session(&session).await.unwrap();
        storage.set_session_ready("sess-1").await.unwrap();
        assert_eq!(storage.list_ready_sessions().await.unwrap().len(), 1);

        // Import recipients.
        for (id, phone) in [("c1", "+15551001"), ("c2", "+15551002")] {
            storage
                .upsert_contact(&Contact {
                    id: id.to_string(),
                    owner_id: "owner-1".to_string(),
                    name: format!("contact {id}"),
                    phone: phone.to_string(),
                    created_at: String::new(),
                })
                .await
                .unwrap();
        }

        // Create a process and walk it to completion.
        let process = ProcessRecord {
            id: "proc-1".to_string(),
            owner_id: "owner-1".to_string(),
            session_id: "sess-1".to_string(),
            total_recipients: 0,
            sent_count: 0,
            status: "pending".to_string(),
            message_text: "launch day!".to_string(),
            media_path: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        storage
            .create_process(&process, &["c1".to_string(), "c2".to_string()])
            .await
            .unwrap();

        assert!(storage.mark_processing("proc-1").await.unwrap());
        assert!(
            storage
                .mark_delivery("proc-1", "c1", DeliveryStatus::Sent)
                .await
                .unwrap()
        );
        assert!(
            storage
                .mark_delivery("proc-1", "c2", DeliveryStatus::Failed)
                .await
                .unwrap()
        );
        assert!(storage.complete_process("proc-1", 1).await.unwrap());

        let p = storage
            .get_process("owner-1", "proc-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.status, "completed");
        assert_eq!(p.sent_count, 1);
        let counts = storage.count_deliveries("proc-1").await.unwrap();
        assert_eq!(counts.sent, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);

        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn queue_operations_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("queue_adapter.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let id = storage
            .queue_push("bulk-send", r#"{"process_id":"p1"}"#)
            .await
            .unwrap();
        assert!(id > 0);
        assert_eq!(storage.queue_len("bulk-send").await.unwrap(), 1);

        let payload = storage.queue_pop("bulk-send").await.unwrap();
        assert_eq!(payload.as_deref(), Some(r#"{"process_id":"p1"}"#));
        assert_eq!(storage.queue_len("bulk-send").await.unwrap(), 0);

        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_runs_checkpoint() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("shutdown.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        storage
            .queue_push("bulk-send", "payload")
            .await
            .unwrap();
        storage.shutdown().await.unwrap();
    }
}
