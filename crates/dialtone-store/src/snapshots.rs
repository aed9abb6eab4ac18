//! Persistence of the [`ReconciliationSnapshot`].
//!
//! There is at most one snapshot. Saving replaces the row in a single
//! `INSERT OR REPLACE`, so a reader sees either the previous snapshot or the
//! new one, never a mix.

use chrono::{DateTime, Utc};
use dialtone_shared::ReconciliationSnapshot;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Replace the stored snapshot.
    pub fn save_snapshot(&self, snapshot: &ReconciliationSnapshot) -> Result<()> {
        let contacts_json = serde_json::to_string(&snapshot.contacts)?;
        let directory_json = serde_json::to_string(&snapshot.directory)?;

        self.conn().execute(
            "INSERT OR REPLACE INTO contact_snapshot
                 (id, pass_id, synced_at, contacts_json, directory_json)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                snapshot.pass_id.to_string(),
                snapshot.synced_at.to_rfc3339(),
                contacts_json,
                directory_json,
            ],
        )?;

        tracing::debug!(
            pass_id = %snapshot.pass_id,
            contacts = snapshot.contacts.len(),
            matches = snapshot.directory.len(),
            "saved contact snapshot"
        );
        Ok(())
    }

    /// Load the stored snapshot, if any.
    pub fn load_snapshot(&self) -> Result<Option<ReconciliationSnapshot>> {
        let row = self
            .conn()
            .query_row(
                "SELECT pass_id, synced_at, contacts_json, directory_json
                 FROM contact_snapshot WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((pass_id, synced_at, contacts_json, directory_json)) = row else {
            return Ok(None);
        };

        Ok(Some(ReconciliationSnapshot {
            pass_id: Uuid::parse_str(&pass_id)?,
            synced_at: DateTime::parse_from_rfc3339(&synced_at)?.with_timezone(&Utc),
            contacts: serde_json::from_str(&contacts_json)?,
            directory: serde_json::from_str(&directory_json)?,
        }))
    }

    /// Delete the stored snapshot. Returns whether one existed.
    pub fn delete_snapshot(&self) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM contact_snapshot WHERE id = 1", [])?;
        Ok(affected > 0)
    }
}
