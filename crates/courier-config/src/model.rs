// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier dispatch daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Daemon identity and logging settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Device-bridge transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Bulk-send worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Daemon identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Display name of the daemon instance.
    #[serde(default = "default_daemon_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            name: default_daemon_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_daemon_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Device-bridge transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Base URL of the external device-bridge daemon.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Directory where per-session transport credentials are stored.
    #[serde(default = "default_auth_data_dir")]
    pub auth_data_dir: String,

    /// Directory where rendered challenge artifacts (QR codes) are written.
    #[serde(default = "default_qr_dir")]
    pub qr_dir: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            auth_data_dir: default_auth_data_dir(),
            qr_dir: default_qr_dir(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8900".to_string()
}

fn default_auth_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("auth"))
        .unwrap_or_else(|| std::path::PathBuf::from("auth"))
        .to_string_lossy()
        .into_owned()
}

fn default_qr_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("qr"))
        .unwrap_or_else(|| std::path::PathBuf::from("qr"))
        .to_string_lossy()
        .into_owned()
}

/// Bulk-send worker configuration.
///
/// The readiness poll interval and timeout are deliberately explicit here
/// rather than hidden constants in the worker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Name of the durable queue the worker consumes.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Delay between consecutive sends within one job, in milliseconds.
    /// This is the rate-limiting control against transport-side throttling.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,

    /// How long a job waits for its session to become ready, in seconds.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Interval between readiness checks, in milliseconds.
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,

    /// How long a registration waits for the first challenge or ready
    /// signal, in seconds.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    /// Pause after an unexpected worker-loop error before resuming, in seconds.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            send_delay_ms: default_send_delay_ms(),
            ready_timeout_secs: default_ready_timeout_secs(),
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

fn default_queue_name() -> String {
    "bulk-send".to_string()
}

fn default_send_delay_ms() -> u64 {
    2000
}

fn default_ready_timeout_secs() -> u64 {
    30
}

fn default_ready_poll_interval_ms() -> u64 {
    500
}

fn default_handshake_timeout_secs() -> u64 {
    120
}

fn default_error_backoff_secs() -> u64 {
    10
}
