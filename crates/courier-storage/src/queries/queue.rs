// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable FIFO queue operations.
//!
//! Pop removes the row in the same transaction that reads it, so a payload
//! is handed out at most once. There is no redelivery: a consumer that
//! crashes mid-job relies on the process status guards, not the queue, for
//! recovery.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;

/// Append a payload to the named queue. Returns the auto-generated row ID.
pub async fn push(db: &Database, queue_name: &str, payload: &str) -> Result<i64, CourierError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload) VALUES (?1, ?2)",
                params![queue_name, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove and return the oldest payload from the named queue.
///
/// Select and delete happen in one transaction. Returns `None` when the
/// queue is empty.
pub async fn pop(db: &Database, queue_name: &str) -> Result<Option<String>, CourierError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = tx.query_row(
                "SELECT id, payload FROM queue
                 WHERE queue_name = ?1
                 ORDER BY id ASC
                 LIMIT 1",
                params![queue_name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            );

            match result {
                Ok((id, payload)) => {
                    tx.execute("DELETE FROM queue WHERE id = ?1", params![id])?;
                    tx.commit()?;
                    Ok(Some(payload))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of payloads waiting in the named queue.
pub async fn len(db: &Database, queue_name: &str) -> Result<i64, CourierError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE queue_name = ?1",
                params![queue_name],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
