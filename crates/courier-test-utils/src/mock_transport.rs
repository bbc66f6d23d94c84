// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport client for deterministic testing.
//!
//! `MockTransport` implements `TransportClient` with scripted handshake
//! events per session, injectable send failures per phone number, and a
//! captured log of everything sent.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use courier_core::traits::adapter::PluginAdapter;
use courier_core::traits::transport::TransportClient;
use courier_core::types::{AdapterType, HealthStatus, TransportEvent};
use courier_core::CourierError;

/// One message captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub session_id: String,
    pub phone: String,
    pub body: String,
    pub media_path: Option<PathBuf>,
}

#[derive(Default)]
struct Inner {
    /// Events delivered immediately when a session initializes.
    scripts: HashMap<String, Vec<TransportEvent>>,
    /// Fallback script for sessions without one of their own. Useful when
    /// the session id is generated by the code under test.
    default_script: Option<Vec<TransportEvent>>,
    /// Live event senders, for emitting events mid-test.
    senders: HashMap<String, mpsc::Sender<TransportEvent>>,
    /// Phone numbers whose sends fail with a transport error.
    failing_phones: HashSet<String>,
    /// Session ids whose initialize call fails outright.
    failing_sessions: HashSet<String>,
    sent: Vec<SentMessage>,
    destroyed: Vec<String>,
    auth_dirs: HashMap<String, PathBuf>,
}

/// A mock device-bridge transport for testing.
///
/// Sessions handshake with whatever events were scripted via
/// [`script_events`](MockTransport::script_events); later events can be
/// pushed through [`emit`](MockTransport::emit).
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the events a session receives as soon as it initializes.
    pub async fn script_events(&self, session_id: &str, events: Vec<TransportEvent>) {
        self.inner
            .lock()
            .await
            .scripts
            .insert(session_id.to_string(), events);
    }

    /// Script the events any session without its own script receives on
    /// initialize.
    pub async fn script_default_events(&self, events: Vec<TransportEvent>) {
        self.inner.lock().await.default_script = Some(events);
    }

    /// Make every send to `phone` fail with a transport error.
    pub async fn fail_phone(&self, phone: &str) {
        self.inner
            .lock()
            .await
            .failing_phones
            .insert(phone.to_string());
    }

    /// Make `initialize` for `session_id` fail outright.
    pub async fn fail_initialize(&self, session_id: &str) {
        self.inner
            .lock()
            .await
            .failing_sessions
            .insert(session_id.to_string());
    }

    /// Emit an event on a live session's feed.
    ///
    /// Returns false when the session was never initialized or its feed
    /// has been torn down.
    pub async fn emit(&self, session_id: &str, event: TransportEvent) -> bool {
        let inner = self.inner.lock().await;
        match inner.senders.get(session_id) {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Everything sent through this transport, in order.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.inner.lock().await.sent.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.inner.lock().await.sent.len()
    }

    /// Session ids that were destroyed, in order.
    pub async fn destroyed_sessions(&self) -> Vec<String> {
        self.inner.lock().await.destroyed.clone()
    }

    /// The auth directory each session was initialized with.
    pub async fn auth_dir_for(&self, session_id: &str) -> Option<PathBuf> {
        self.inner.lock().await.auth_dirs.get(session_id).cloned()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl TransportClient for MockTransport {
    async fn initialize(
        &self,
        session_id: &str,
        auth_dir: &Path,
    ) -> Result<mpsc::Receiver<TransportEvent>, CourierError> {
        let mut inner = self.inner.lock().await;
        if inner.failing_sessions.contains(session_id) {
            return Err(CourierError::Transport {
                message: format!("mock initialize failure for {session_id}"),
                source: None,
            });
        }

        let (tx, rx) = mpsc::channel(64);
        let scripted = inner
            .scripts
            .get(session_id)
            .cloned()
            .or_else(|| inner.default_script.clone())
            .unwrap_or_default();
        inner.senders.insert(session_id.to_string(), tx.clone());
        inner
            .auth_dirs
            .insert(session_id.to_string(), auth_dir.to_path_buf());
        drop(inner);

        for event in scripted {
            // Capacity 64 is far beyond any script used in tests.
            let _ = tx.send(event).await;
        }
        Ok(rx)
    }

    async fn send_text(
        &self,
        session_id: &str,
        phone: &str,
        body: &str,
    ) -> Result<(), CourierError> {
        let mut inner = self.inner.lock().await;
        if inner.failing_phones.contains(phone) {
            return Err(CourierError::Transport {
                message: format!("mock send failure to {phone}"),
                source: None,
            });
        }
        inner.sent.push(SentMessage {
            session_id: session_id.to_string(),
            phone: phone.to_string(),
            body: body.to_string(),
            media_path: None,
        });
        Ok(())
    }

    async fn send_media(
        &self,
        session_id: &str,
        phone: &str,
        media_path: &Path,
        caption: &str,
    ) -> Result<(), CourierError> {
        let mut inner = self.inner.lock().await;
        if inner.failing_phones.contains(phone) {
            return Err(CourierError::Transport {
                message: format!("mock send failure to {phone}"),
                source: None,
            });
        }
        inner.sent.push(SentMessage {
            session_id: session_id.to_string(),
            phone: phone.to_string(),
            body: caption.to_string(),
            media_path: Some(media_path.to_path_buf()),
        });
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), CourierError> {
        let mut inner = self.inner.lock().await;
        inner.senders.remove(session_id);
        inner.destroyed.push(session_id.to_string());
        Ok(())
    }
}
