// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/SSE client for the external device-bridge daemon.
//!
//! The bridge owns the actual messaging-network connections; this crate
//! talks to it over a small REST surface and subscribes to one SSE feed per
//! session. Bridge events (`qr`, `authenticated`, `ready`, `disconnected`,
//! `auth_failure`) are mapped onto [`TransportEvent`] and pushed into the
//! channel handed back from `initialize`.

pub mod wire;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use courier_config::model::TransportConfig;
use courier_core::types::{AdapterType, HealthStatus, TransportEvent};
use courier_core::{CourierError, PluginAdapter, TransportClient};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use wire::{AuthFailureData, DisconnectedData, QrData, SendMessageRequest, StartSessionRequest};

/// Transport client backed by the device-bridge daemon.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    client: reqwest::Client,
    /// Separate client without a request timeout; the SSE feed stays open
    /// for the session's whole lifetime.
    feed_client: reqwest::Client,
    base_url: String,
}

impl BridgeTransport {
    /// Build a client against the configured bridge URL.
    ///
    /// Sends carry a generous timeout because the bridge uploads media to
    /// the network synchronously; the SSE feed request is exempted from it.
    pub fn new(config: &TransportConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CourierError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        let feed_client =
            reqwest::Client::builder()
                .build()
                .map_err(|e| CourierError::Transport {
                    message: format!("failed to build HTTP client: {e}"),
                    source: Some(Box::new(e)),
                })?;
        Ok(Self {
            client,
            feed_client,
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
        })
    }

    fn session_url(&self, session_id: &str, suffix: &str) -> String {
        format!("{}/sessions/{session_id}{suffix}", self.base_url)
    }

    async fn check_response(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, CourierError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CourierError::Transport {
            message: format!("{context}: bridge returned {status}: {body}"),
            source: None,
        })
    }
}

/// Map one SSE event from the session feed onto a [`TransportEvent`].
///
/// Unknown event names are skipped so the bridge can grow its vocabulary
/// without breaking older daemons.
fn map_event(name: &str, data: &str) -> Option<TransportEvent> {
    match name {
        "qr" => match serde_json::from_str::<QrData>(data) {
            Ok(d) => Some(TransportEvent::Qr(d.qr)),
            Err(e) => {
                warn!(error = %e, "malformed qr event, skipping");
                None
            }
        },
        "authenticated" => Some(TransportEvent::Authenticated),
        "ready" => Some(TransportEvent::Ready),
        "disconnected" => {
            let reason = serde_json::from_str::<DisconnectedData>(data)
                .map(|d| d.reason)
                .unwrap_or_default();
            Some(TransportEvent::Disconnected { reason })
        }
        "auth_failure" => {
            let message = serde_json::from_str::<AuthFailureData>(data)
                .map(|d| d.message)
                .unwrap_or_default();
            Some(TransportEvent::AuthFailed { message })
        }
        other => {
            debug!(event = other, "unknown bridge event, skipping");
            None
        }
    }
}

#[async_trait]
impl PluginAdapter for BridgeTransport {
    fn name(&self) -> &str {
        "device-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(response) => Ok(HealthStatus::Degraded(format!(
                "bridge health returned {}",
                response.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("bridge unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        // Sessions are torn down individually via destroy; the bridge
        // process itself outlives us.
        Ok(())
    }
}

#[async_trait]
impl TransportClient for BridgeTransport {
    async fn initialize(
        &self,
        session_id: &str,
        auth_dir: &Path,
    ) -> Result<mpsc::Receiver<TransportEvent>, CourierError> {
        let start_url = self.session_url(session_id, "");
        let response = self
            .client
            .post(&start_url)
            .json(&StartSessionRequest {
                auth_dir: &auth_dir.to_string_lossy(),
            })
            .send()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("session start request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Self::check_response(response, "session start").await?;

        let events_url = self.session_url(session_id, "/events");
        let response = self
            .feed_client
            .get(&events_url)
            .send()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("event feed request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let response = Self::check_response(response, "event feed").await?;

        let (tx, rx) = mpsc::channel(64);
        let session = session_id.to_string();
        tokio::spawn(async move {
            let mut stream = response.bytes_stream().eventsource();
            while let Some(result) = stream.next().await {
                match result {
                    Ok(event) => {
                        if let Some(mapped) = map_event(&event.event, &event.data) {
                            if tx.send(mapped).await.is_err() {
                                // Nobody is listening anymore.
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session, error = %e, "event feed broke");
                        let _ = tx
                            .send(TransportEvent::Disconnected {
                                reason: format!("event feed error: {e}"),
                            })
                            .await;
                        break;
                    }
                }
            }
            debug!(session_id = %session, "event feed closed");
        });

        Ok(rx)
    }

    async fn send_text(
        &self,
        session_id: &str,
        phone: &str,
        body: &str,
    ) -> Result<(), CourierError> {
        let url = self.session_url(session_id, "/messages");
        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                phone,
                body,
                media_path: None,
            })
            .send()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("send request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Self::check_response(response, "send").await?;
        Ok(())
    }

    async fn send_media(
        &self,
        session_id: &str,
        phone: &str,
        media_path: &Path,
        caption: &str,
    ) -> Result<(), CourierError> {
        let url = self.session_url(session_id, "/messages");
        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                phone,
                body: caption,
                media_path: Some(&media_path.to_string_lossy()),
            })
            .send()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("media send request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Self::check_response(response, "media send").await?;
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), CourierError> {
        let url = self.session_url(session_id, "");
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("session teardown request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        // An unknown session is already gone; that is success here.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_response(response, "session teardown").await?;
        Ok(())
    }
}
