// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier dispatch daemon.

use thiserror::Error;

/// The primary error type used across all Courier adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport errors (bridge unreachable, send rejected, event stream failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A session already exists for this owner and phone number.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The session exists but is not in the Ready state.
    #[error("session not ready: {0}")]
    NotReady(String),

    /// The messaging network rejected the session's credentials. Fatal for
    /// that session; a fresh registration is required.
    #[error("authentication rejected for session {session_id}")]
    AuthRejected { session_id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// Conflicts and credential rejections are terminal; timeouts and
    /// transport hiccups are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CourierError::Transport { .. }
                | CourierError::Timeout { .. }
                | CourierError::NotReady(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(
            CourierError::Timeout {
                duration: std::time::Duration::from_secs(30)
            }
            .is_retryable()
        );
        assert!(CourierError::NotReady("s1".into()).is_retryable());
        assert!(
            CourierError::Transport {
                message: "bridge down".into(),
                source: None
            }
            .is_retryable()
        );
        assert!(!CourierError::Conflict("duplicate".into()).is_retryable());
        assert!(
            !CourierError::AuthRejected {
                session_id: "s1".into()
            }
            .is_retryable()
        );
        assert!(!CourierError::Config("bad".into()).is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = CourierError::AuthRejected {
            session_id: "sess-9".into(),
        };
        assert!(err.to_string().contains("sess-9"));
    }
}
