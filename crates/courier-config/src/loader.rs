// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./courier.toml` > `~/.config/courier/courier.toml`
//! > `/etc/courier/courier.toml` with environment variable overrides via the
//! `COURIER_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CourierConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/courier/courier.toml` (system-wide)
/// 3. `~/.config/courier/courier.toml` (user XDG config)
/// 4. `./courier.toml` (local directory)
/// 5. `COURIER_*` environment variables
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file("/etc/courier/courier.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("courier/courier.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("courier.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `COURIER_STORAGE_DATABASE_PATH` must map
/// to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("daemon_", "daemon.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("transport_", "transport.", 1)
            .replacen("worker_", "worker.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_files() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.daemon.name, "courier");
        assert_eq!(config.worker.queue_name, "bulk-send");
        assert_eq!(config.worker.send_delay_ms, 2000);
        assert_eq!(config.worker.ready_poll_interval_ms, 500);
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml = r#"
[worker]
send_delay_ms = 50
ready_timeout_secs = 2

[transport]
bridge_url = "http://bridge.internal:9000"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.worker.send_delay_ms, 50);
        assert_eq!(config.worker.ready_timeout_secs, 2);
        assert_eq!(config.transport.bridge_url, "http://bridge.internal:9000");
        // Untouched sections keep defaults.
        assert_eq!(config.daemon.log_level, "info");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
[worker]
send_dealy_ms = 50
"#;
        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let toml = r#"
[werker]
queue_name = "x"
"#;
        assert!(load_config_from_str(toml).is_err());
    }
}
