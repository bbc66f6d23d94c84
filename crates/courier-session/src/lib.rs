// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device session lifecycle management.
//!
//! The [`SessionManager`] owns the path from registration to a ready,
//! sendable session: it creates the durable record, starts the transport
//! handshake, renders challenge artifacts, and pumps transport events into
//! state transitions. A per-session lock in the [`SessionRegistry`] is the
//! single mutation point for live state, so stale or racing events can
//! never move a session backwards.

pub mod qr;
pub mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use courier_config::model::{TransportConfig, WorkerConfig};
use courier_core::types::{SessionRecord, SessionState, TransportEvent};
use courier_core::{CourierError, StorageAdapter, TransportClient};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use registry::{LiveSession, SessionRegistry};

/// Outcome of a successful registration.
///
/// `state` is either `AwaitingScan` (a challenge artifact was written to
/// `qr_path`) or `Ready` (stored credentials were accepted without a scan).
#[derive(Debug)]
pub struct Registration {
    pub session_id: String,
    pub state: SessionState,
    pub qr_path: Option<PathBuf>,
}

/// First noteworthy signal out of a session's handshake.
#[derive(Debug, Clone)]
enum HandshakeSignal {
    AwaitingScan { qr_path: PathBuf },
    Ready,
    AuthFailed { message: String },
    Disconnected { reason: String },
}

/// Drives device sessions through their lifecycle.
pub struct SessionManager {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    transport: Arc<dyn TransportClient + Send + Sync>,
    registry: SessionRegistry,
    transport_cfg: TransportConfig,
    worker_cfg: WorkerConfig,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        transport: Arc<dyn TransportClient + Send + Sync>,
        transport_cfg: TransportConfig,
        worker_cfg: WorkerConfig,
    ) -> Self {
        Self {
            storage,
            transport,
            registry: SessionRegistry::new(),
            transport_cfg,
            worker_cfg,
        }
    }

    /// The live-session registry, shared with the worker for readiness checks.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a new device session and run its handshake.
    ///
    /// Blocks until the transport either issues a challenge, comes up ready
    /// from stored credentials, or fails; the configured handshake timeout
    /// bounds the wait. On any failure the half-created session is torn
    /// down again, so a failed registration leaves no trace.
    pub async fn register(
        &self,
        owner_id: &str,
        phone: &str,
        name: &str,
    ) -> Result<Registration, CourierError> {
        // A durable row without a live entry is a leftover from a dropped
        // connection; replace it rather than refusing the registration.
        if let Some(existing) = self.storage.find_session_by_phone(owner_id, phone).await? {
            if self.registry.contains(&existing.id).await {
                return Err(CourierError::Conflict(format!(
                    "session {} already registered for this owner and phone",
                    existing.id
                )));
            }
            info!(session_id = %existing.id, owner_id, phone, "replacing defunct session");
            self.storage.delete_session(&existing.id).await?;
            qr::remove_qr_artifact(Path::new(&self.transport_cfg.qr_dir), &existing.id);
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let record = SessionRecord {
            id: session_id.clone(),
            owner_id: owner_id.to_string(),
            phone: phone.to_string(),
            name: name.to_string(),
            qr_path: None,
            qr_scanned: false,
            authenticated: false,
            ready: false,
            last_seen_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        // Conflict on (owner, phone) surfaces here, before anything is live.
        self.storage.create_session(&record).await?;

        self.registry
            .insert(LiveSession::new(session_id.clone(), owner_id.to_string()))
            .await;

        let auth_dir = Path::new(&self.transport_cfg.auth_data_dir).join(&session_id);
        let events = match self.transport.initialize(&session_id, &auth_dir).await {
            Ok(events) => events,
            Err(e) => {
                self.teardown(&session_id).await;
                return Err(e);
            }
        };

        let (signal_tx, mut signal_rx) = watch::channel(None);
        self.spawn_event_pump(session_id.clone(), events, Some(signal_tx));

        let handshake = Duration::from_secs(self.worker_cfg.handshake_timeout_secs);
        let outcome = tokio::time::timeout(handshake, async {
            loop {
                if let Some(signal) = signal_rx.borrow_and_update().clone() {
                    return signal;
                }
                if signal_rx.changed().await.is_err() {
                    return HandshakeSignal::Disconnected {
                        reason: "event feed closed during handshake".to_string(),
                    };
                }
            }
        })
        .await;

        match outcome {
            Ok(HandshakeSignal::AwaitingScan { qr_path }) => {
                info!(%session_id, owner_id, "session registered, awaiting scan");
                Ok(Registration {
                    session_id,
                    state: SessionState::AwaitingScan,
                    qr_path: Some(qr_path),
                })
            }
            Ok(HandshakeSignal::Ready) => {
                info!(%session_id, owner_id, "session registered and ready");
                Ok(Registration {
                    session_id,
                    state: SessionState::Ready,
                    qr_path: None,
                })
            }
            Ok(HandshakeSignal::AuthFailed { message }) => {
                warn!(%session_id, %message, "registration rejected by network");
                self.teardown(&session_id).await;
                Err(CourierError::AuthRejected { session_id })
            }
            Ok(HandshakeSignal::Disconnected { reason }) => {
                self.teardown(&session_id).await;
                Err(CourierError::Transport {
                    message: format!("handshake aborted: {reason}"),
                    source: None,
                })
            }
            Err(_) => {
                warn!(%session_id, "handshake timed out");
                self.teardown(&session_id).await;
                Err(CourierError::Timeout {
                    duration: handshake,
                })
            }
        }
    }

    /// Re-initialize every session whose durable record says ready.
    ///
    /// Best effort and idempotent: already-live sessions are skipped, and a
    /// session that fails to come back is marked disconnected instead of
    /// aborting the rest. Returns how many sessions were brought back.
    pub async fn resume(&self) -> Result<usize, CourierError> {
        let records = self.storage.list_ready_sessions().await?;
        let mut resumed = 0;
        for record in records {
            if self.registry.contains(&record.id).await {
                continue;
            }
            self.registry
                .insert(LiveSession::new(record.id.clone(), record.owner_id.clone()))
                .await;

            let auth_dir = Path::new(&self.transport_cfg.auth_data_dir).join(&record.id);
            match self.transport.initialize(&record.id, &auth_dir).await {
                Ok(events) => {
                    self.spawn_event_pump(record.id.clone(), events, None);
                    info!(session_id = %record.id, "session resumed");
                    resumed += 1;
                }
                Err(e) => {
                    warn!(session_id = %record.id, error = %e, "resume failed");
                    self.registry.remove(&record.id).await;
                    if let Err(e) = self.storage.set_session_disconnected(&record.id).await {
                        warn!(session_id = %record.id, error = %e, "could not record disconnect");
                    }
                }
            }
        }
        Ok(resumed)
    }

    /// Current live state of a session, if it is registered in this process.
    pub async fn state(&self, session_id: &str) -> Option<SessionState> {
        self.registry.state_of(session_id).await
    }

    /// The outstanding challenge payload, while the session awaits a scan.
    pub async fn qr_code(&self, session_id: &str) -> Option<String> {
        let entry = self.registry.get(session_id).await?;
        let live = entry.lock().await;
        live.qr_payload.clone()
    }

    /// Poll until the session is ready or `timeout` elapses.
    ///
    /// Unknown session ids are not an error here; they simply never become
    /// ready and run into the timeout.
    pub async fn wait_until_ready(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> Result<(), CourierError> {
        let poll = Duration::from_millis(self.worker_cfg.ready_poll_interval_ms);
        let deadline = Instant::now() + timeout;
        loop {
            if self.registry.state_of(session_id).await == Some(SessionState::Ready) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CourierError::Timeout { duration: timeout });
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Send one message through a ready session.
    ///
    /// A session that is not ready is a caller error ([`CourierError::NotReady`]).
    /// A transport-level send failure is an expected per-recipient outcome
    /// and comes back as `Ok(false)` so bulk jobs can keep going.
    pub async fn send(
        &self,
        session_id: &str,
        phone: &str,
        body: &str,
        media_path: Option<&Path>,
    ) -> Result<bool, CourierError> {
        if self.registry.state_of(session_id).await != Some(SessionState::Ready) {
            return Err(CourierError::NotReady(session_id.to_string()));
        }

        let result = match media_path {
            Some(path) => self.transport.send_media(session_id, phone, path, body).await,
            None => self.transport.send_text(session_id, phone, body).await,
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(session_id, phone, error = %e, "send failed");
                Ok(false)
            }
        }
    }

    /// Tear down a session everywhere: transport, registry, durable record,
    /// and challenge artifact. Destroying an unknown id is a no-op.
    pub async fn destroy(&self, session_id: &str) -> Result<(), CourierError> {
        if let Err(e) = self.transport.destroy(session_id).await {
            warn!(%session_id, error = %e, "transport teardown failed");
        }
        self.registry.remove(session_id).await;
        self.storage.delete_session(session_id).await?;
        qr::remove_qr_artifact(Path::new(&self.transport_cfg.qr_dir), session_id);
        info!(session_id, "session destroyed");
        Ok(())
    }

    /// Best-effort rollback of a registration that did not reach a stable
    /// state. Unlike [`destroy`](Self::destroy), storage errors are logged
    /// rather than surfaced; the caller already has a better error.
    async fn teardown(&self, session_id: &str) {
        if let Err(e) = self.transport.destroy(session_id).await {
            debug!(session_id, error = %e, "transport teardown failed");
        }
        self.registry.remove(session_id).await;
        if let Err(e) = self.storage.delete_session(session_id).await {
            warn!(%session_id, error = %e, "could not delete session record");
        }
        qr::remove_qr_artifact(Path::new(&self.transport_cfg.qr_dir), session_id);
    }

    /// Spawn the task that applies one session's transport events to its
    /// live entry and the durable record.
    fn spawn_event_pump(
        &self,
        session_id: String,
        mut events: mpsc::Receiver<TransportEvent>,
        handshake: Option<watch::Sender<Option<HandshakeSignal>>>,
    ) {
        let storage = Arc::clone(&self.storage);
        let registry = self.registry.clone();
        let qr_dir = PathBuf::from(&self.transport_cfg.qr_dir);

        tokio::spawn(async move {
            let mut handshake = handshake;
            while let Some(event) = events.recv().await {
                // A missing entry means the session was destroyed; stop.
                let Some(entry) = registry.get(&session_id).await else {
                    break;
                };
                let mut live = entry.lock().await;
                match event {
                    TransportEvent::Qr(payload) => match live.state {
                        SessionState::Created | SessionState::AwaitingScan => {
                            match qr::write_qr_artifact(&qr_dir, &session_id, &payload) {
                                Ok(path) => {
                                    let path_str = path.to_string_lossy().into_owned();
                                    if let Err(e) =
                                        storage.set_qr_issued(&session_id, &path_str).await
                                    {
                                        warn!(%session_id, error = %e, "could not record challenge");
                                    }
                                    live.qr_payload = Some(payload);
                                    live.qr_path = Some(path.clone());
                                    live.state = SessionState::AwaitingScan;
                                    info!(%session_id, path = %path_str, "challenge issued");
                                    signal(
                                        &mut handshake,
                                        HandshakeSignal::AwaitingScan { qr_path: path },
                                    );
                                }
                                Err(e) => {
                                    warn!(%session_id, error = %e, "challenge rendering failed");
                                }
                            }
                        }
                        _ => {
                            warn!(%session_id, state = %live.state, "stale challenge ignored");
                        }
                    },
                    TransportEvent::Authenticated => match live.state {
                        SessionState::Created | SessionState::AwaitingScan => {
                            if let Err(e) = storage.set_session_authenticated(&session_id).await {
                                warn!(%session_id, error = %e, "could not record authentication");
                            }
                            live.state = SessionState::Authenticated;
                            live.qr_payload = None;
                            info!(%session_id, "session authenticated");
                        }
                        _ => {
                            warn!(%session_id, state = %live.state, "stale auth event ignored");
                        }
                    },
                    TransportEvent::Ready => match live.state {
                        SessionState::Ready => {
                            debug!(%session_id, "duplicate ready event ignored");
                        }
                        SessionState::Disconnected => {
                            warn!(%session_id, "stale ready event ignored after disconnect");
                        }
                        _ => {
                            if let Err(e) = storage.set_session_ready(&session_id).await {
                                warn!(%session_id, error = %e, "could not record readiness");
                            }
                            live.state = SessionState::Ready;
                            live.qr_payload = None;
                            info!(%session_id, "session ready");
                            signal(&mut handshake, HandshakeSignal::Ready);
                        }
                    },
                    TransportEvent::Disconnected { reason } => {
                        if let Err(e) = storage.set_session_disconnected(&session_id).await {
                            warn!(%session_id, error = %e, "could not record disconnect");
                        }
                        live.state = SessionState::Disconnected;
                        warn!(%session_id, %reason, "session disconnected");
                        signal(&mut handshake, HandshakeSignal::Disconnected { reason });
                        // Terminal: drop the live entry so the phone can
                        // register again.
                        drop(live);
                        registry.remove(&session_id).await;
                        break;
                    }
                    TransportEvent::AuthFailed { message } => {
                        if let Err(e) = storage.set_session_disconnected(&session_id).await {
                            warn!(%session_id, error = %e, "could not record disconnect");
                        }
                        live.state = SessionState::Disconnected;
                        warn!(%session_id, %message, "authentication rejected");
                        signal(&mut handshake, HandshakeSignal::AuthFailed { message });
                        // Terminal for this session; a fresh registration is required.
                        drop(live);
                        registry.remove(&session_id).await;
                        break;
                    }
                }
            }

            // Feed closed. If the session is still live, record the drop and
            // retire the entry.
            if let Some(entry) = registry.get(&session_id).await {
                {
                    let mut live = entry.lock().await;
                    if live.state != SessionState::Disconnected {
                        if let Err(e) = storage.set_session_disconnected(&session_id).await {
                            warn!(%session_id, error = %e, "could not record disconnect");
                        }
                        live.state = SessionState::Disconnected;
                        warn!(%session_id, "event feed closed, session marked disconnected");
                    }
                }
                registry.remove(&session_id).await;
            }
            debug!(%session_id, "event pump stopped");
        });
    }
}

/// Resolve the handshake exactly once; later calls are no-ops.
fn signal(handshake: &mut Option<watch::Sender<Option<HandshakeSignal>>>, s: HandshakeSignal) {
    if let Some(tx) = handshake.take() {
        let _ = tx.send(Some(s));
    }
}
