// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Courier workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind the [`PluginAdapter`](crate::PluginAdapter) base trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    Transport,
    Storage,
}

/// Lifecycle state of a device session.
///
/// The controller drives Created → AwaitingScan → Authenticated → Ready;
/// Disconnected is terminal until a fresh registration re-creates the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    AwaitingScan,
    Authenticated,
    Ready,
    Disconnected,
}

/// Overall status of a bulk-send process. Transitions are monotonic:
/// pending → processing → {completed | failed}, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Per-recipient outcome of a bulk-send process. A delivery row is created
/// `Pending` and flipped at most once to a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Events emitted by the messaging transport for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A one-time challenge payload the user must scan to authenticate.
    Qr(String),
    /// Credentials were accepted by the messaging network.
    Authenticated,
    /// The session is connected and operational.
    Ready,
    /// The session lost its connection, for any reason.
    Disconnected { reason: String },
    /// The messaging network rejected the session's credentials.
    AuthFailed { message: String },
}

/// Durable record of a registered device session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub owner_id: String,
    pub phone: String,
    pub name: String,
    /// Path to the rendered challenge artifact, if one was issued.
    pub qr_path: Option<String>,
    pub qr_scanned: bool,
    pub authenticated: bool,
    pub ready: bool,
    pub last_seen_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A recipient imported into an owner's contact list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub phone: String,
    pub created_at: String,
}

/// Aggregate record tracking one bulk-send job's overall progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: String,
    pub owner_id: String,
    pub session_id: String,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub status: String,
    pub message_text: String,
    pub media_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-recipient outcome row for a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub process_id: String,
    pub contact_id: String,
    pub status: String,
    pub sent_at: Option<String>,
    pub created_at: String,
}

/// Delivery status tallies for one process (the ledger's read surface).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

/// A unit of fan-out work: send one message to a set of recipients through
/// one session. Serialized as JSON into the durable queue; consumed exactly
/// once by the worker and immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkJob {
    pub process_id: String,
    pub owner_id: String,
    pub session_id: String,
    pub contact_ids: Vec<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn session_state_round_trips_through_strings() {
        for state in [
            SessionState::Created,
            SessionState::AwaitingScan,
            SessionState::Authenticated,
            SessionState::Ready,
            SessionState::Disconnected,
        ] {
            let s = state.to_string();
            assert_eq!(SessionState::from_str(&s).unwrap(), state);
        }
        assert_eq!(SessionState::AwaitingScan.to_string(), "awaiting_scan");
    }

    #[test]
    fn process_status_uses_lowercase_storage_form() {
        assert_eq!(ProcessStatus::Pending.to_string(), "pending");
        assert_eq!(ProcessStatus::Processing.to_string(), "processing");
        assert_eq!(ProcessStatus::Completed.to_string(), "completed");
        assert_eq!(ProcessStatus::Failed.to_string(), "failed");
        assert_eq!(
            ProcessStatus::from_str("failed").unwrap(),
            ProcessStatus::Failed
        );
    }

    #[test]
    fn bulk_job_json_round_trip() {
        let job = BulkJob {
            process_id: "p1".into(),
            owner_id: "u1".into(),
            session_id: "s1".into(),
            contact_ids: vec!["c1".into(), "c2".into()],
            message: "hello".into(),
            media_path: None,
        };
        let json = serde_json::to_string(&job).unwrap();
        // media_path is omitted when absent to keep queue payloads small.
        assert!(!json.contains("media_path"));
        let back: BulkJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn bulk_job_media_path_survives() {
        let job = BulkJob {
            process_id: "p1".into(),
            owner_id: "u1".into(),
            session_id: "s1".into(),
            contact_ids: vec!["c1".into()],
            message: "caption".into(),
            media_path: Some("/tmp/pic.png".into()),
        };
        let json = serde_json::to_string(&job).unwrap();
        let back: BulkJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.media_path.as_deref(), Some("/tmp/pic.png"));
    }
}
