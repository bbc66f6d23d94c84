// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact list operations.

use courier_core::types::Contact;
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;

fn row_to_contact(row: &rusqlite::Row<'_>) -> Result<Contact, rusqlite::Error> {
    Ok(Contact {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Insert a contact, or refresh the name if the owner already has this
/// phone number. The existing row keeps its id.
pub async fn upsert_contact(db: &Database, contact: &Contact) -> Result<(), CourierError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, owner_id, name, phone)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (owner_id, phone) DO UPDATE SET name = excluded.name",
                params![contact.id, contact.owner_id, contact.name, contact.phone],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List an owner's contacts.
pub async fn list_contacts(db: &Database, owner_id: &str) -> Result<Vec<Contact>, CourierError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, name, phone, created_at FROM contacts
                 WHERE owner_id = ?1 ORDER BY name ASC",
            )?;
            let rows = stmt.query_map(params![owner_id], row_to_contact)?;
            let mut contacts = Vec::new();
            for row in rows {
                contacts.push(row?);
            }
            Ok(contacts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Resolve contact ids to rows, scoped to `owner_id`.
///
/// Results follow the order of `ids`. Unknown ids and ids belonging to a
/// different owner are silently absent from the result.
pub async fn find_contacts(
    db: &Database,
    owner_id: &str,
    ids: &[String],
) -> Result<Vec<Contact>, CourierError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let owner_id = owner_id.to_string();
    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, name, phone, created_at FROM contacts
                 WHERE owner_id = ?1 AND id = ?2",
            )?;
            let mut contacts = Vec::new();
            for id in &ids {
                let result = stmt.query_row(params![owner_id, id], row_to_contact);
                match result {
                    Ok(contact) => contacts.push(contact),
                    Err(rusqlite::Error::QueryReturnedNoRows) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(contacts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn sample_contact(id: &str, owner: &str, name: &str, phone: &str) -> Contact {
        Contact {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            created_at: String::new(),
        }
    }

    #[tokio::test]
    async fn upsert_refreshes_name_and_keeps_id() {
        let (db, _dir) = setup_db().await;

        upsert_contact(&db, &sample_contact("c1", "owner-1", "Ada", "+15550001"))
            .await
            .unwrap();
        upsert_contact(&db, &sample_contact("c9", "owner-1", "Ada L.", "+15550001"))
            .await
            .unwrap();

        let contacts = list_contacts(&db, "owner-1").await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, "c1");
        assert_eq!(contacts[0].name, "Ada L.");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_contacts_preserves_request_order() {
        let (db, _dir) = setup_db().await;
        upsert_contact(&db, &sample_contact("c1", "owner-1", "Ada", "+15550001"))
            .await
            .unwrap();
        upsert_contact(&db, &sample_contact("c2", "owner-1", "Grace", "+15550002"))
            .await
            .unwrap();
        upsert_contact(&db, &sample_contact("c3", "owner-1", "Edsger", "+15550003"))
            .await
            .unwrap();

        let found = find_contacts(
            &db,
            "owner-1",
            &["c3".to_string(), "c1".to_string(), "c2".to_string()],
        )
        .await
        .unwrap();
        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c3", "c1", "c2"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_contacts_skips_unknown_and_foreign_ids() {
        let (db, _dir) = setup_db().await;
        upsert_contact(&db, &sample_contact("c1", "owner-1", "Ada", "+15550001"))
            .await
            .unwrap();
        upsert_contact(&db, &sample_contact("c2", "owner-2", "Mallory", "+15550002"))
            .await
            .unwrap();

        let found = find_contacts(
            &db,
            "owner-1",
            &["c1".to_string(), "c2".to_string(), "nope".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "c1");

        let empty = find_contacts(&db, "owner-1", &[]).await.unwrap();
        assert!(empty.is_empty());

        db.close().await.unwrap();
    }
}
