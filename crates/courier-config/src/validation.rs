// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths and sane worker intervals.

use miette::Diagnostic;
use thiserror::Error;

use crate::model::CourierConfig;

/// A configuration error with miette diagnostics for terminal rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The config failed to parse or merge.
    #[error("{message}")]
    #[diagnostic(code(courier::config::parse))]
    Parse { message: String },

    /// The config parsed but a value violates a semantic constraint.
    #[error("{message}")]
    #[diagnostic(code(courier::config::validation))]
    Validation { message: String },
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let url = config.transport.bridge_url.trim();
    if url.is_empty() {
        errors.push(ConfigError::Validation {
            message: "transport.bridge_url must not be empty".to_string(),
        });
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        errors.push(ConfigError::Validation {
            message: format!("transport.bridge_url `{url}` must be an http(s) URL"),
        });
    }

    if config.transport.auth_data_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "transport.auth_data_dir must not be empty".to_string(),
        });
    }

    if config.transport.qr_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "transport.qr_dir must not be empty".to_string(),
        });
    }

    if config.worker.queue_name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "worker.queue_name must not be empty".to_string(),
        });
    }

    if config.worker.ready_poll_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.ready_poll_interval_ms must be at least 1".to_string(),
        });
    }

    if config.worker.ready_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.ready_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.worker.handshake_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.handshake_timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Render configuration errors to stderr via miette's fancy reporter.
pub fn render_errors(errors: &[ConfigError]) {
    for err in errors {
        eprintln!("{:?}", miette::Report::msg(err.to_string()));
    }
}
