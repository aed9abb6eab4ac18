//! v001 -- Contact snapshot table.
//!
//! The snapshot is a single row so that replacing it is one statement.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS contact_snapshot (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    pass_id        TEXT NOT NULL,             -- UUID v4 of the producing pass
    synced_at      TEXT NOT NULL,             -- RFC-3339
    contacts_json  TEXT NOT NULL,             -- JSON array of device contacts
    directory_json TEXT NOT NULL              -- JSON object phone -> user record
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
