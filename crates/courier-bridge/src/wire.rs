// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and event payloads on the device-bridge HTTP surface.

use serde::{Deserialize, Serialize};

/// Body of `POST /sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct StartSessionRequest<'a> {
    /// Where the bridge keeps this session's credentials between runs.
    pub auth_dir: &'a str,
}

/// Body of `POST /sessions/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub phone: &'a str,
    /// Message text, or the caption when `media_path` is set.
    pub body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_path: Option<&'a str>,
}

/// Data of a `qr` event on the session feed.
#[derive(Debug, Deserialize)]
pub struct QrData {
    pub qr: String,
}

/// Data of a `disconnected` event.
#[derive(Debug, Deserialize)]
pub struct DisconnectedData {
    #[serde(default)]
    pub reason: String,
}

/// Data of an `auth_failure` event.
#[derive(Debug, Deserialize)]
pub struct AuthFailureData {
    #[serde(default)]
    pub message: String,
}
