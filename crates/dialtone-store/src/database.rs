//! SQLite handle for the contact snapshot.
//!
//! Opening a [`Database`] always leaves the schema at the current version.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

const DB_FILE_NAME: &str = "contacts.db";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Where [`Database::new`] keeps the snapshot, e.g.
    /// `$XDG_DATA_HOME/dialtone/contacts.db` on Linux.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "dialtone", "dialtone").ok_or(StoreError::NoDataDir)?;
        Ok(dirs.data_dir().join(DB_FILE_NAME))
    }

    /// Open the snapshot database in the platform data directory.
    pub fn new() -> Result<Self> {
        Self::open_at(&Self::default_path()?)
    }

    /// Open the snapshot database at `path`, creating missing parent
    /// directories.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        tracing::info!(path = %path.display(), "opening snapshot database");

        let conn = Connection::open(path)?;
        // Readers keep going while a pass replaces the snapshot row.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// File backing this handle, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}
