// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport client trait for the opaque messaging network connection.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::TransportEvent;

/// Client for the messaging network transport.
///
/// One transport instance multiplexes any number of device sessions, keyed
/// by session id. The transport's handshake is asynchronous and reported
/// through the event receiver returned by [`initialize`](Self::initialize);
/// callers must not assume a session is usable until a
/// [`TransportEvent::Ready`] arrives.
#[async_trait]
pub trait TransportClient: PluginAdapter {
    /// Starts (or resumes, if `auth_dir` holds prior credentials) the
    /// transport connection for one session and returns its event feed.
    ///
    /// The receiver closes when the transport tears the session down.
    async fn initialize(
        &self,
        session_id: &str,
        auth_dir: &Path,
    ) -> Result<mpsc::Receiver<TransportEvent>, CourierError>;

    /// Sends a plain text message to one recipient address.
    async fn send_text(
        &self,
        session_id: &str,
        phone: &str,
        body: &str,
    ) -> Result<(), CourierError>;

    /// Sends a media file with an optional caption to one recipient address.
    async fn send_media(
        &self,
        session_id: &str,
        phone: &str,
        media_path: &Path,
        caption: &str,
    ) -> Result<(), CourierError>;

    /// Tears down the transport connection for one session.
    ///
    /// Destroying an unknown session id is a no-op.
    async fn destroy(&self, session_id: &str) -> Result<(), CourierError>;
}
