// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory registry of live sessions.
//!
//! The registry is a cache of transport handles layered over the durable
//! `sessions` rows. Each entry is wrapped in its own `Mutex`; that lock is
//! the single mutation point for a session's live state, so the event pump
//! and API callers never interleave half-applied transitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use courier_core::types::SessionState;
use tokio::sync::{Mutex, RwLock};

/// Live state of one registered session.
#[derive(Debug)]
pub struct LiveSession {
    pub id: String,
    pub owner_id: String,
    pub state: SessionState,
    /// The current challenge payload, while one is outstanding.
    pub qr_payload: Option<String>,
    /// Where the rendered challenge artifact was written.
    pub qr_path: Option<PathBuf>,
}

impl LiveSession {
    pub fn new(id: String, owner_id: String) -> Self {
        Self {
            id,
            owner_id,
            state: SessionState::Created,
            qr_payload: None,
            qr_path: None,
        }
    }
}

/// Shared map of session id to live session entry.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<Mutex<LiveSession>>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh entry. Returns false if the id was already present.
    pub async fn insert(&self, session: LiveSession) -> bool {
        let mut map = self.inner.write().await;
        if map.contains_key(&session.id) {
            return false;
        }
        map.insert(session.id.clone(), Arc::new(Mutex::new(session)));
        true
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<LiveSession>>> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Mutex<LiveSession>>> {
        self.inner.write().await.remove(id)
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.contains_key(id)
    }

    /// Snapshot of one session's state, if it is live.
    pub async fn state_of(&self, id: &str) -> Option<SessionState> {
        let entry = self.get(id).await?;
        let session = entry.lock().await;
        Some(session.state)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let registry = SessionRegistry::new();
        assert!(registry.insert(LiveSession::new("s1".into(), "o1".into())).await);
        assert!(!registry.insert(LiveSession::new("s1".into(), "o1".into())).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn state_of_reflects_mutations_through_the_entry_lock() {
        let registry = SessionRegistry::new();
        registry
            .insert(LiveSession::new("s1".into(), "o1".into()))
            .await;
        assert_eq!(registry.state_of("s1").await, Some(SessionState::Created));

        let entry = registry.get("s1").await.unwrap();
        entry.lock().await.state = SessionState::Ready;
        assert_eq!(registry.state_of("s1").await, Some(SessionState::Ready));

        registry.remove("s1").await;
        assert_eq!(registry.state_of("s1").await, None);
    }
}
