// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device session records.

use courier_core::types::SessionRecord;
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;

const SESSION_COLUMNS: &str = "id, owner_id, phone, name, qr_path, qr_scanned,
     authenticated, ready, last_seen_at, created_at, updated_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRecord, rusqlite::Error> {
    Ok(SessionRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        phone: row.get(2)?,
        name: row.get(3)?,
        qr_path: row.get(4)?,
        qr_scanned: row.get(5)?,
        authenticated: row.get(6)?,
        ready: row.get(7)?,
        last_seen_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert a new session record.
///
/// The `(owner_id, phone)` pair is unique; a second registration for the
/// same device surfaces as [`CourierError::Conflict`].
pub async fn create_session(db: &Database, record: &SessionRecord) -> Result<(), CourierError> {
    let record = record.clone();
    let result = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, owner_id, phone, name, qr_path, qr_scanned,
                     authenticated, ready, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.owner_id,
                    record.phone,
                    record.name,
                    record.qr_path,
                    record.qr_scanned,
                    record.authenticated,
                    record.ready,
                    record.last_seen_at,
                ],
            )?;
            Ok(())
        })
        .await;

    match result {
        Ok(()) => Ok(()),
        Err(tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(e, msg)))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(CourierError::Conflict(
                msg.unwrap_or_else(|| "session already exists for this owner and phone".into()),
            ))
        }
        Err(e) => Err(crate::database::map_tr_err(e)),
    }
}

/// Get a session by ID.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<SessionRecord>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up the session an owner registered for a given phone, if any.
pub async fn find_by_owner_and_phone(
    db: &Database,
    owner_id: &str,
    phone: &str,
) -> Result<Option<SessionRecord>, CourierError> {
    let owner_id = owner_id.to_string();
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE owner_id = ?1 AND phone = ?2"
            ))?;
            let result = stmt.query_row(params![owner_id, phone], row_to_session);
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List sessions, optionally scoped to one owner.
pub async fn list_sessions(
    db: &Database,
    owner_id: Option<&str>,
) -> Result<Vec<SessionRecord>, CourierError> {
    let owner_id = owner_id.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut sessions = Vec::new();
            match &owner_id {
                Some(owner) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions
                         WHERE owner_id = ?1 ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![owner], row_to_session)?;
                    for row in rows {
                        sessions.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map([], row_to_session)?;
                    for row in rows {
                        sessions.push(row?);
                    }
                }
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Sessions whose durable record says ready. This is the set the daemon
/// re-initializes after a restart.
pub async fn list_ready_sessions(db: &Database) -> Result<Vec<SessionRecord>, CourierError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE ready = 1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a freshly issued challenge artifact and reset the scanned flag.
pub async fn set_qr_issued(db: &Database, id: &str, qr_path: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    let qr_path = qr_path.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET qr_path = ?1, qr_scanned = 0,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![qr_path, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark the session authenticated. The challenge was necessarily scanned.
pub async fn set_authenticated(db: &Database, id: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET qr_scanned = 1, authenticated = 1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark the session ready and stamp `last_seen_at`.
pub async fn set_ready(db: &Database, id: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET ready = 1, authenticated = 1, qr_scanned = 1,
                 last_seen_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Clear the ready and authenticated flags after a disconnect.
pub async fn set_disconnected(db: &Database, id: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET ready = 0, authenticated = 0,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a session record. Deleting an unknown id is a no-op.
pub async fn delete_session(db: &Database, id: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
