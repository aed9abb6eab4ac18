//! Storage of the reconciliation snapshot.
//!
//! Both implementations replace the snapshot as a whole: a reader observes
//! either the previous snapshot or the new one.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use dialtone_shared::ReconciliationSnapshot;
use dialtone_store::Database;

use crate::error::SyncError;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read_snapshot(&self) -> Result<Option<ReconciliationSnapshot>, SyncError>;

    async fn write_snapshot(&self, snapshot: &ReconciliationSnapshot) -> Result<(), SyncError>;

    async fn delete_snapshot(&self) -> Result<(), SyncError>;
}

/// Process-local snapshot store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: RwLock<Option<Arc<ReconciliationSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read_snapshot(&self) -> Result<Option<ReconciliationSnapshot>, SyncError> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.as_deref().cloned())
    }

    async fn write_snapshot(&self, snapshot: &ReconciliationSnapshot) -> Result<(), SyncError> {
        let replacement = Arc::new(snapshot.clone());
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(replacement);
        Ok(())
    }

    async fn delete_snapshot(&self) -> Result<(), SyncError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Snapshot store backed by the SQLite [`Database`].
///
/// `rusqlite` is blocking, so every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteSnapshotStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open the snapshot database in the platform data directory, see
    /// [`Database::default_path`].
    pub fn open_default() -> Result<Self, SyncError> {
        Ok(Self::new(Database::new()?))
    }

    pub fn open_at(path: &Path) -> Result<Self, SyncError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> dialtone_store::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| SyncError::Persistence(format!("Lock poisoned: {e}")))?;
            f(&guard).map_err(SyncError::from)
        })
        .await?
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn read_snapshot(&self) -> Result<Option<ReconciliationSnapshot>, SyncError> {
        self.with_db(|db| db.load_snapshot()).await
    }

    async fn write_snapshot(&self, snapshot: &ReconciliationSnapshot) -> Result<(), SyncError> {
        let snapshot = snapshot.clone();
        self.with_db(move |db| db.save_snapshot(&snapshot)).await
    }

    async fn delete_snapshot(&self) -> Result<(), SyncError> {
        self.with_db(|db| db.delete_snapshot()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::contacts::testing::{device_contact, phone, user};

    fn snapshot() -> ReconciliationSnapshot {
        ReconciliationSnapshot {
            pass_id: Uuid::new_v4(),
            synced_at: Utc::now(),
            contacts: vec![device_contact("c1", "Ali", &["3333 4444"])],
            directory: HashMap::from([(phone("3333 4444"), user("u1", "97333334444"))]),
        }
    }

    async fn exercise(store: &dyn SnapshotStore) {
        assert!(store.read_snapshot().await.unwrap().is_none());

        let first = snapshot();
        store.write_snapshot(&first).await.unwrap();
        assert_eq!(store.read_snapshot().await.unwrap(), Some(first));

        let second = snapshot();
        store.write_snapshot(&second).await.unwrap();
        assert_eq!(
            store.read_snapshot().await.unwrap().map(|s| s.pass_id),
            Some(second.pass_id)
        );

        store.delete_snapshot().await.unwrap();
        assert!(store.read_snapshot().await.unwrap().is_none());
        // Deleting nothing is fine.
        store.delete_snapshot().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemorySnapshotStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSnapshotStore::open_at(&dir.path().join("contacts.db")).unwrap();
        exercise(&store).await;
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_sqlite_store_in_data_home() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_DATA_HOME", dir.path());

        let store = SqliteSnapshotStore::open_default().unwrap();
        store.write_snapshot(&snapshot()).await.unwrap();

        let reopened = SqliteSnapshotStore::open_default().unwrap();
        assert!(reopened.read_snapshot().await.unwrap().is_some());
        assert!(Database::default_path().unwrap().starts_with(dir.path()));
    }
}
