// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-consumer bulk-send worker.
//!
//! The worker blocks on the durable queue, claims each job by flipping its
//! process to 'processing', and fans the message out to the resolved
//! recipients one send at a time with a configured pause between sends.
//! Per-recipient failures are recorded and tolerated; only a job that never
//! gets a ready session fails as a whole.

pub mod queue;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use courier_config::model::WorkerConfig;
use courier_core::types::{BulkJob, DeliveryStatus};
use courier_core::{CourierError, StorageAdapter};
use courier_session::SessionManager;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use queue::JobQueue;

/// Consumes bulk-send jobs from the durable queue, one at a time.
pub struct Worker {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    sessions: Arc<SessionManager>,
    queue: JobQueue,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        sessions: Arc<SessionManager>,
        queue: JobQueue,
        config: WorkerConfig,
    ) -> Self {
        Self {
            storage,
            sessions,
            queue,
            config,
        }
    }

    /// Run until cancelled. A job in flight is finished before the loop
    /// observes the cancellation.
    ///
    /// Restart recovery happens here: previously ready sessions are
    /// re-attached before the first pop, so a backlog persisted across a
    /// restart finds its sessions coming up.
    pub async fn run(&self, cancel: CancellationToken) {
        match self.sessions.resume().await {
            Ok(resumed) if resumed > 0 => info!(resumed, "sessions resumed"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "session resume failed"),
        }
        info!(queue = self.queue.queue_name(), "worker started");
        let backoff = Duration::from_secs(self.config.error_backoff_secs);
        loop {
            let job = tokio::select! {
                _ = cancel.cancelled() => break,
                job = self.queue.pop() => job,
            };
            match job {
                Ok(job) => {
                    if let Err(e) = self.process_job(&job).await {
                        warn!(process_id = %job.process_id, error = %e, "job processing failed");
                        // Release the claim so the process does not sit in
                        // 'processing' forever; the job itself is spent.
                        if let Err(e) = self.storage.fail_process(&job.process_id).await {
                            warn!(process_id = %job.process_id, error = %e, "could not fail process");
                        }
                        self.cleanup_media(&job);
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "queue pop failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
        info!("worker stopped");
    }

    /// Process one job end to end.
    ///
    /// Errors returned here are storage-level; anything expected (recipient
    /// failures, an absent session) is absorbed into the process and
    /// delivery records instead.
    async fn process_job(&self, job: &BulkJob) -> Result<(), CourierError> {
        // Claim the process. Losing the claim means the job is a duplicate
        // or the process was cancelled out from under us; either way it is
        // not ours to run.
        if !self.storage.mark_processing(&job.process_id).await? {
            warn!(process_id = %job.process_id, "process not pending, skipping job");
            return Ok(());
        }
        info!(
            process_id = %job.process_id,
            session_id = %job.session_id,
            recipients = job.contact_ids.len(),
            "job claimed"
        );

        // The session must come up before any send. A job whose session
        // never appears fails whole, with every delivery left pending.
        let ready_timeout = Duration::from_secs(self.config.ready_timeout_secs);
        if let Err(e) = self
            .sessions
            .wait_until_ready(&job.session_id, ready_timeout)
            .await
        {
            warn!(
                process_id = %job.process_id,
                session_id = %job.session_id,
                error = %e,
                "session never became ready, failing job"
            );
            self.storage.fail_process(&job.process_id).await?;
            self.cleanup_media(job);
            return Ok(());
        }

        // Resolve recipients under the job's owner. Ids that do not resolve
        // get their deliveries failed up front; they can never be sent to.
        let contacts = self
            .storage
            .find_contacts(&job.owner_id, &job.contact_ids)
            .await?;
        let resolved: HashSet<&str> = contacts.iter().map(|c| c.id.as_str()).collect();
        for contact_id in &job.contact_ids {
            if !resolved.contains(contact_id.as_str()) {
                debug!(process_id = %job.process_id, contact_id = %contact_id, "unresolvable recipient");
                self.storage
                    .mark_delivery(&job.process_id, contact_id, DeliveryStatus::Failed)
                    .await?;
            }
        }

        let delay = Duration::from_millis(self.config.send_delay_ms);
        let media = job.media_path.as_deref().map(Path::new);
        let mut sent_count: i64 = 0;
        for (i, contact) in contacts.iter().enumerate() {
            if i > 0 {
                // Pacing between sends is the throttling defence.
                tokio::time::sleep(delay).await;
            }

            let delivered = match self
                .sessions
                .send(&job.session_id, &contact.phone, &job.message, media)
                .await
            {
                Ok(delivered) => delivered,
                Err(e) => {
                    // Session dropped mid-job. This recipient is lost, but
                    // the rest still get their attempt.
                    warn!(
                        process_id = %job.process_id,
                        contact_id = %contact.id,
                        error = %e,
                        "send rejected"
                    );
                    false
                }
            };

            let status = if delivered {
                sent_count += 1;
                DeliveryStatus::Sent
            } else {
                DeliveryStatus::Failed
            };
            self.storage
                .mark_delivery(&job.process_id, &contact.id, status)
                .await?;
        }

        self.storage
            .complete_process(&job.process_id, sent_count)
            .await?;
        info!(
            process_id = %job.process_id,
            sent_count,
            total = job.contact_ids.len(),
            "job completed"
        );
        self.cleanup_media(job);
        Ok(())
    }

    /// Remove the job's media file once its fate is decided, success or not.
    fn cleanup_media(&self, job: &BulkJob) {
        if let Some(path) = &job.media_path {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(process_id = %job.process_id, path = %path, "media removed"),
                Err(e) => debug!(process_id = %job.process_id, path = %path, error = %e, "media cleanup skipped"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_config::model::{StorageConfig, TransportConfig, WorkerConfig};
    use courier_core::types::{Contact, ProcessRecord, SessionState, TransportEvent};
    use courier_storage::SqliteStorage;
    use courier_test_utils::{FlakyStorage, MockTransport};
    use tempfile::{tempdir, TempDir};

    struct Harness {
        storage: Arc<SqliteStorage>,
        sessions: Arc<SessionManager>,
        transport: MockTransport,
        queue: JobQueue,
        cancel: CancellationToken,
        dir: TempDir,
    }

    impl Harness {
        async fn start() -> Self {
            let dir = tempdir().unwrap();
            let storage = Arc::new(SqliteStorage::new(StorageConfig {
                database_path: dir.path().join("w.db").to_string_lossy().into_owned(),
                wal_mode: true,
            }));
            storage.initialize().await.unwrap();

            let transport = MockTransport::new();
            let transport_cfg = TransportConfig {
                bridge_url: "http://127.0.0.1:8900".to_string(),
                auth_data_dir: dir.path().join("auth").to_string_lossy().into_owned(),
                qr_dir: dir.path().join("qr").to_string_lossy().into_owned(),
            };
            let worker_cfg = WorkerConfig {
                queue_name: "bulk-send".to_string(),
                send_delay_ms: 1,
                ready_timeout_secs: 1,
                ready_poll_interval_ms: 10,
                handshake_timeout_secs: 1,
                error_backoff_secs: 1,
            };

            let sessions = Arc::new(SessionManager::new(
                storage.clone(),
                Arc::new(transport.clone()),
                transport_cfg,
                worker_cfg.clone(),
            ));
            let queue = JobQueue::new(storage.clone(), &worker_cfg.queue_name);

            let worker = Worker::new(
                storage.clone(),
                sessions.clone(),
                queue.clone(),
                worker_cfg,
            );
            let cancel = CancellationToken::new();
            let worker_cancel = cancel.clone();
            tokio::spawn(async move { worker.run(worker_cancel).await });

            Self {
                storage,
                sessions,
                transport,
                queue,
                cancel,
                dir,
            }
        }

        /// Register a ready session and return its id.
        async fn ready_session(&self) -> String {
            self.transport
                .script_default_events(vec![TransportEvent::Ready])
                .await;
            let reg = self
                .sessions
                .register("owner-1", "+15550000", "sender")
                .await
                .unwrap();
            assert_eq!(reg.state, SessionState::Ready);
            reg.session_id
        }

        async fn add_contacts(&self, specs: &[(&str, &str)]) {
            for (id, phone) in specs {
                self.storage
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
        }

        async fn submit(&self, process_id: &str, session_id: &str, contact_ids: &[&str]) {
            self.submit_with_media(process_id, session_id, contact_ids, None)
                .await;
        }

        async fn submit_with_media(
            &self,
            process_id: &str,
            session_id: &str,
            contact_ids: &[&str],
            media_path: Option<String>,
        ) {
            let ids: Vec<String> = contact_ids.iter().map(|s| s.to_string()).collect();
            self.storage
                .create_process(
                    &ProcessRecord {
                        id: process_id.to_string(),
                        owner_id: "owner-1".to_string(),
                        session_id: session_id.to_string(),
                        total_recipients: 0,
                        sent_count: 0,
                        status: "pending".to_string(),
                        message_text: "bulk hello".to_string(),
                        media_path: media_path.clone(),
                        created_at: String::new(),
                        updated_at: String::new(),
                    },
                    &ids,
                )
                .await
                .unwrap();
            self.queue
                .push(&BulkJob {
                    process_id: process_id.to_string(),
                    owner_id: "owner-1".to_string(),
                    session_id: session_id.to_string(),
                    contact_ids: ids,
                    message: "bulk hello".to_string(),
                    media_path,
                })
                .await
                .unwrap();
        }

        async fn wait_for_status(&self, process_id: &str, want: &str) -> ProcessRecord {
            for _ in 0..500 {
                let p = self
                    .storage
                    .get_process("owner-1", process_id)
                    .await
                    .unwrap()
                    .unwrap();
                if p.status == want {
                    return p;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("process {process_id} never reached {want}");
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.cancel.cancel();
        }
    }

    #[tokio::test]
    async fn bulk_job_sends_to_every_recipient_in_order() {
        let h = Harness::start().await;
        let session_id = h.ready_session().await;
        h.add_contacts(&[
            ("c1", "+15551001"),
            ("c2", "+15551002"),
            ("c3", "+15551003"),
        ])
        .await;

        h.submit("p1", &session_id, &["c2", "c1", "c3"]).await;
        let p = h.wait_for_status("p1", "completed").await;
        assert_eq!(p.sent_count, 3);

        let counts = h.storage.count_deliveries("p1").await.unwrap();
        assert_eq!(counts.sent, 3);
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.failed, 0);

        // Sends follow the job's recipient order, not insertion order.
        let phones: Vec<String> = h
            .transport
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.phone)
            .collect();
        assert_eq!(phones, ["+15551002", "+15551001", "+15551003"]);
    }

    #[tokio::test]
    async fn recipient_failures_do_not_sink_the_job() {
        let h = Harness::start().await;
        let session_id = h.ready_session().await;
        h.add_contacts(&[
            ("c1", "+15551001"),
            ("c2", "+15551002"),
            ("c3", "+15551003"),
            ("c4", "+15551004"),
            ("c5", "+15551005"),
        ])
        .await;
        h.transport.fail_phone("+15551003").await;

        h.submit("p1", &session_id, &["c1", "c2", "c3", "c4", "c5"])
            .await;
        let p = h.wait_for_status("p1", "completed").await;
        assert_eq!(p.sent_count, 4);

        let counts = h.storage.count_deliveries("p1").await.unwrap();
        assert_eq!(counts.sent, 4);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);

        let deliveries = h.storage.list_deliveries("p1").await.unwrap();
        let failed: Vec<&str> = deliveries
            .iter()
            .filter(|d| d.status == "failed")
            .map(|d| d.contact_id.as_str())
            .collect();
        assert_eq!(failed, ["c3"]);
    }

    #[tokio::test]
    async fn job_for_absent_session_fails_whole() {
        let h = Harness::start().await;
        h.add_contacts(&[("c1", "+15551001")]).await;

        h.submit("p1", "no-such-session", &["c1"]).await;
        h.wait_for_status("p1", "failed").await;

        // Nothing was attempted: deliveries stay pending.
        let counts = h.storage.count_deliveries("p1").await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(h.transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn media_is_sent_with_caption_and_cleaned_up() {
        let h = Harness::start().await;
        let session_id = h.ready_session().await;
        h.add_contacts(&[("c1", "+15551001"), ("c2", "+15551002")])
            .await;

        let media = h.dir.path().join("picture.png");
        std::fs::write(&media, b"fake image bytes").unwrap();
        h.submit_with_media(
            "p1",
            &session_id,
            &["c1", "c2"],
            Some(media.to_string_lossy().into_owned()),
        )
        .await;

        let p = h.wait_for_status("p1", "completed").await;
        assert_eq!(p.sent_count, 2);

        let sent = h.transport.sent_messages().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.media_path.as_deref() == Some(media.as_path())));
        assert!(!media.exists(), "media should be removed after the job");
    }

    #[tokio::test]
    async fn media_is_cleaned_up_when_the_job_fails() {
        let h = Harness::start().await;
        h.add_contacts(&[("c1", "+15551001")]).await;

        let media = h.dir.path().join("doomed.png");
        std::fs::write(&media, b"bytes").unwrap();
        h.submit_with_media(
            "p1",
            "no-such-session",
            &["c1"],
            Some(media.to_string_lossy().into_owned()),
        )
        .await;

        h.wait_for_status("p1", "failed").await;
        assert!(!media.exists(), "media should be removed on failure too");
    }

    #[tokio::test]
    async fn unresolvable_recipients_are_failed_up_front() {
        let h = Harness::start().await;
        let session_id = h.ready_session().await;
        h.add_contacts(&[("c1", "+15551001")]).await;
        // c2 belongs to someone else entirely.
        h.storage
            .upsert_contact(&Contact {
                id: "c2".to_string(),
                owner_id: "owner-2".to_string(),
                name: "foreign".to_string(),
                phone: "+15559002".to_string(),
                created_at: String::new(),
            })
            .await
            .unwrap();

        h.submit("p1", &session_id, &["c1", "c2", "ghost"]).await;
        let p = h.wait_for_status("p1", "completed").await;
        assert_eq!(p.sent_count, 1);

        let counts = h.storage.count_deliveries("p1").await.unwrap();
        assert_eq!(counts.sent, 1);
        assert_eq!(counts.failed, 2);

        // The foreign contact was never contacted.
        let phones: Vec<String> = h
            .transport
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.phone)
            .collect();
        assert_eq!(phones, ["+15551001"]);
    }

    #[tokio::test]
    async fn non_pending_processes_are_skipped() {
        let h = Harness::start().await;
        let session_id = h.ready_session().await;
        h.add_contacts(&[("c1", "+15551001")]).await;

        h.storage
            .create_process(
                &ProcessRecord {
                    id: "p1".to_string(),
                    owner_id: "owner-1".to_string(),
                    session_id: session_id.clone(),
                    total_recipients: 0,
                    sent_count: 0,
                    status: "pending".to_string(),
                    message_text: "hi".to_string(),
                    media_path: None,
                    created_at: String::new(),
                    updated_at: String::new(),
                },
                &["c1".to_string()],
            )
            .await
            .unwrap();
        // Someone already failed it (e.g. an operator cancel).
        assert!(h.storage.fail_process("p1").await.unwrap());

        h.queue
            .push(&BulkJob {
                process_id: "p1".to_string(),
                owner_id: "owner-1".to_string(),
                session_id,
                contact_ids: vec!["c1".to_string()],
                message: "hi".to_string(),
                media_path: None,
            })
            .await
            .unwrap();

        // The job drains from the queue without any send happening.
        for _ in 0..200 {
            if h.queue.len().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.transport.sent_count().await, 0);
        let p = h
            .storage
            .get_process("owner-1", "p1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.status, "failed");
    }

    #[tokio::test]
    async fn storage_failure_mid_job_releases_the_claim() {
        let dir = tempdir().unwrap();
        let sqlite = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("w.db").to_string_lossy().into_owned(),
            wal_mode: true,
        }));
        sqlite.initialize().await.unwrap();
        let flaky = Arc::new(FlakyStorage::wrap(sqlite.clone()));
        let storage: Arc<dyn StorageAdapter + Send + Sync> = flaky.clone();

        let transport = MockTransport::new();
        let transport_cfg = TransportConfig {
            bridge_url: "http://127.0.0.1:8900".to_string(),
            auth_data_dir: dir.path().join("auth").to_string_lossy().into_owned(),
            qr_dir: dir.path().join("qr").to_string_lossy().into_owned(),
        };
        let worker_cfg = WorkerConfig {
            queue_name: "bulk-send".to_string(),
            send_delay_ms: 1,
            ready_timeout_secs: 1,
            ready_poll_interval_ms: 10,
            handshake_timeout_secs: 1,
            error_backoff_secs: 1,
        };
        let sessions = Arc::new(SessionManager::new(
            storage.clone(),
            Arc::new(transport.clone()),
            transport_cfg,
            worker_cfg.clone(),
        ));
        let queue = JobQueue::new(storage.clone(), &worker_cfg.queue_name);
        let worker = Worker::new(storage.clone(), sessions.clone(), queue.clone(), worker_cfg);
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        tokio::spawn(async move { worker.run(worker_cancel).await });

        transport
            .script_default_events(vec![TransportEvent::Ready])
            .await;
        let reg = sessions
            .register("owner-1", "+15550000", "sender")
            .await
            .unwrap();
        sqlite
            .upsert_contact(&Contact {
                id: "c1".to_string(),
                owner_id: "owner-1".to_string(),
                name: "contact c1".to_string(),
                phone: "+15551001".to_string(),
                created_at: String::new(),
            })
            .await
            .unwrap();

        let media = dir.path().join("doomed.png");
        std::fs::write(&media, b"bytes").unwrap();
        sqlite
            .create_process(
                &ProcessRecord {
                    id: "p1".to_string(),
                    owner_id: "owner-1".to_string(),
                    session_id: reg.session_id.clone(),
                    total_recipients: 0,
                    sent_count: 0,
                    status: "pending".to_string(),
                    message_text: "bulk hello".to_string(),
                    media_path: Some(media.to_string_lossy().into_owned()),
                    created_at: String::new(),
                    updated_at: String::new(),
                },
                &["c1".to_string()],
            )
            .await
            .unwrap();

        // Recipient resolution blows up after the claim is taken.
        flaky.fail_operation("find_contacts").await;
        queue
            .push(&BulkJob {
                process_id: "p1".to_string(),
                owner_id: "owner-1".to_string(),
                session_id: reg.session_id,
                contact_ids: vec!["c1".to_string()],
                message: "bulk hello".to_string(),
                media_path: Some(media.to_string_lossy().into_owned()),
            })
            .await
            .unwrap();

        // The process must not stay parked in 'processing'.
        let mut status = String::new();
        for _ in 0..500 {
            status = sqlite
                .get_process("owner-1", "p1")
                .await
                .unwrap()
                .unwrap()
                .status;
            if status == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, "failed");
        assert!(!media.exists(), "media should be removed on failure too");
        assert_eq!(transport.sent_count().await, 0);

        cancel.cancel();
    }

    #[tokio::test]
    async fn full_registration_to_dispatch_scenario() {
        let h = Harness::start().await;

        // The device walks the whole handshake: challenge, scan, ready.
        h.transport
            .script_default_events(vec![
                TransportEvent::Qr("challenge-payload".to_string()),
                TransportEvent::Authenticated,
                TransportEvent::Ready,
            ])
            .await;
        let reg = h
            .sessions
            .register("owner-1", "+15550000", "sender")
            .await
            .unwrap();
        assert_eq!(reg.state, SessionState::AwaitingScan);
        assert!(reg.qr_path.is_some());
        h.sessions
            .wait_until_ready(&reg.session_id, Duration::from_secs(2))
            .await
            .unwrap();

        h.add_contacts(&[("c1", "+15551001"), ("c2", "+15551002")])
            .await;
        h.transport.fail_phone("+15551002").await;

        h.submit("p1", &reg.session_id, &["c1", "c2"]).await;
        let p = h.wait_for_status("p1", "completed").await;
        assert_eq!(p.sent_count, 1);

        let deliveries = h.storage.list_deliveries("p1").await.unwrap();
        let by_contact: Vec<(&str, &str)> = deliveries
            .iter()
            .map(|d| (d.contact_id.as_str(), d.status.as_str()))
            .collect();
        assert!(by_contact.contains(&("c1", "sent")));
        assert!(by_contact.contains(&("c2", "failed")));
    }

    #[tokio::test]
    async fn jobs_run_one_at_a_time_in_queue_order() {
        let h = Harness::start().await;
        let session_id = h.ready_session().await;
        h.add_contacts(&[("c1", "+15551001")]).await;

        h.submit("p1", &session_id, &["c1"]).await;
        h.submit("p2", &session_id, &["c1"]).await;
        h.submit("p3", &session_id, &["c1"]).await;

        h.wait_for_status("p3", "completed").await;
        // By the time the last job finished, the earlier ones must have too.
        for pid in ["p1", "p2"] {
            let p = h.storage.get_process("owner-1", pid).await.unwrap().unwrap();
            assert_eq!(p.status, "completed");
        }

        let sent = h.transport.sent_messages().await;
        assert_eq!(sent.len(), 3);
    }
}
