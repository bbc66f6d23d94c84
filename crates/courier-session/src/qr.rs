// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Challenge artifact rendering.
//!
//! The transport hands us an opaque challenge payload; we render it as a
//! scannable unicode QR block and write it to `<qr_dir>/<session_id>.txt`
//! so operators can cat the file into any terminal.

use std::path::{Path, PathBuf};

use courier_core::CourierError;
use qrcode::render::unicode;
use qrcode::QrCode;

/// Render `payload` as a unicode QR block and write it under `qr_dir`.
///
/// Re-issuing overwrites the previous artifact for the same session.
pub fn write_qr_artifact(
    qr_dir: &Path,
    session_id: &str,
    payload: &str,
) -> Result<PathBuf, CourierError> {
    std::fs::create_dir_all(qr_dir)
        .map_err(|e| CourierError::Internal(format!("cannot create qr dir: {e}")))?;

    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| CourierError::Internal(format!("cannot encode challenge payload: {e}")))?;
    let rendered = code
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .build();

    let path = qr_dir.join(format!("{session_id}.txt"));
    std::fs::write(&path, rendered)
        .map_err(|e| CourierError::Internal(format!("cannot write qr artifact: {e}")))?;
    Ok(path)
}

/// Remove a session's challenge artifact if one exists.
pub fn remove_qr_artifact(qr_dir: &Path, session_id: &str) {
    let path = qr_dir.join(format!("{session_id}.txt"));
    let _ = std::fs::remove_file(path);
}
