// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient delivery rows.
//!
//! A delivery row is born 'pending' together with its process and is flipped
//! at most once to 'sent' or 'failed'. The flip carries a status guard in the
//! WHERE clause, so replays and races leave the first outcome in place.

use courier_core::types::{Delivery, DeliveryCounts, DeliveryStatus};
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;

fn row_to_delivery(row: &rusqlite::Row<'_>) -> Result<Delivery, rusqlite::Error> {
    Ok(Delivery {
        id: row.get(0)?,
        process_id: row.get(1)?,
        contact_id: row.get(2)?,
        status: row.get(3)?,
        sent_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Flip one pending delivery to a terminal status.
///
/// Returns false when the row is unknown or already terminal.
pub async fn mark_delivery(
    db: &Database,
    process_id: &str,
    contact_id: &str,
    status: DeliveryStatus,
) -> Result<bool, CourierError> {
    let process_id = process_id.to_string();
    let contact_id = contact_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let n = if status == "sent" {
                conn.execute(
                    "UPDATE deliveries SET status = 'sent',
                     sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE process_id = ?1 AND contact_id = ?2 AND status = 'pending'",
                    params![process_id, contact_id],
                )?
            } else {
                conn.execute(
                    "UPDATE deliveries SET status = ?1
                     WHERE process_id = ?2 AND contact_id = ?3 AND status = 'pending'",
                    params![status, process_id, contact_id],
                )?
            };
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List a process's delivery rows in creation order.
pub async fn list_deliveries(
    db: &Database,
    process_id: &str,
) -> Result<Vec<Delivery>, CourierError> {
    let process_id = process_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, process_id, contact_id, status, sent_at, created_at
                 FROM deliveries WHERE process_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![process_id], row_to_delivery)?;
            let mut deliveries = Vec::new();
            for row in rows {
                deliveries.push(row?);
            }
            Ok(deliveries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Tally a process's deliveries by status.
pub async fn count_deliveries(
    db: &Database,
    process_id: &str,
) -> Result<DeliveryCounts, CourierError> {
    let process_id = process_id.to_string();
    db.connection()
        .call(move |conn| {
            let counts = conn.query_row(
                "SELECT
                     COUNT(*) FILTER (WHERE status = 'pending'),
                     COUNT(*) FILTER (WHERE status = 'sent'),
                     COUNT(*) FILTER (WHERE status = 'failed')
                 FROM deliveries WHERE process_id = ?1",
                params![process_id],
                |row| {
                    Ok(DeliveryCounts {
                        pending: row.get(0)?,
                        sent: row.get(1)?,
                        failed: row.get(2)?,
                    })
                },
            )?;
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
