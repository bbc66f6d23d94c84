// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk-send process records.
//!
//! Status transitions are guarded in SQL: each UPDATE carries a WHERE clause
//! naming the states it may leave from, so a stale caller can never move a
//! process backwards. Callers learn from the returned bool whether their
//! transition actually happened.

use courier_core::types::ProcessRecord;
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;

const PROCESS_COLUMNS: &str = "id, owner_id, session_id, total_recipients, sent_count,
     status, message_text, media_path, created_at, updated_at";

fn row_to_process(row: &rusqlite::Row<'_>) -> Result<ProcessRecord, rusqlite::Error> {
    Ok(ProcessRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        session_id: row.get(2)?,
        total_recipients: row.get(3)?,
        sent_count: row.get(4)?,
        status: row.get(5)?,
        message_text: row.get(6)?,
        media_path: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Create the process row plus one pending delivery row per contact id,
/// all inside a single transaction.
pub async fn create_process(
    db: &Database,
    process: &ProcessRecord,
    contact_ids: &[String],
) -> Result<(), CourierError> {
    let process = process.clone();
    let contact_ids = contact_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO processes (id, owner_id, session_id, total_recipients,
                     sent_count, status, message_text, media_path)
                 VALUES (?1, ?2, ?3, ?4, 0, 'pending', ?5, ?6)",
                params![
                    process.id,
                    process.owner_id,
                    process.session_id,
                    contact_ids.len() as i64,
                    process.message_text,
                    process.media_path,
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO deliveries (process_id, contact_id) VALUES (?1, ?2)",
                )?;
                for contact_id in &contact_ids {
                    stmt.execute(params![process.id, contact_id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get one process, scoped to its owner.
pub async fn get_process(
    db: &Database,
    owner_id: &str,
    id: &str,
) -> Result<Option<ProcessRecord>, CourierError> {
    let owner_id = owner_id.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROCESS_COLUMNS} FROM processes WHERE owner_id = ?1 AND id = ?2"
            ))?;
            let result = stmt.query_row(params![owner_id, id], row_to_process);
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List an owner's processes, newest first.
pub async fn list_processes(
    db: &Database,
    owner_id: &str,
) -> Result<Vec<ProcessRecord>, CourierError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROCESS_COLUMNS} FROM processes
                 WHERE owner_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![owner_id], row_to_process)?;
            let mut processes = Vec::new();
            for row in rows {
                processes.push(row?);
            }
            Ok(processes)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// pending → processing. Returns false when the process was not pending.
pub async fn mark_processing(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE processes SET status = 'processing',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// processing → completed, recording the final sent tally.
pub async fn complete_process(
    db: &Database,
    id: &str,
    sent_count: i64,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE processes SET status = 'completed', sent_count = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = 'processing'",
                params![sent_count, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// {pending, processing} → failed. Completed and failed processes stay put.
pub async fn fail_process(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE processes SET status = 'failed',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status IN ('pending', 'processing')",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
