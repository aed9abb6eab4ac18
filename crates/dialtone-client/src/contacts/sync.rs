//! Reconciliation cache and single-flight sync coordinator.
//!
//! A pass reads the address book, resolves every number against the
//! directory, persists the result as one snapshot and returns the merged
//! view. [`ContactSync`] serves fresh snapshots directly and otherwise runs
//! a pass, with at most one pass in flight per coordinator: later callers
//! attach to the running one.
//!
//! Passes run on their own tokio task, so a caller that stops waiting does
//! not abandon the pass and the coordinator always returns to idle.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dialtone_shared::{CanonicalPhone, PhoneNormalizer, ReconciledContact, ReconciliationSnapshot};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::device::{DeviceContactReader, DeviceContacts};
use super::directory::{DirectoryMatcher, UserDirectory};
use super::merge::{self, merge};
use super::persistence::SnapshotStore;
use crate::config::SyncConfig;
use crate::error::SyncError;

/// Source of "now" for snapshot timestamps and staleness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whether a pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

type PassResult = Arc<Vec<ReconciledContact>>;
type SharedPass = Shared<BoxFuture<'static, PassResult>>;

struct InFlight {
    pass_id: Uuid,
    result: SharedPass,
}

struct Inner {
    reader: DeviceContactReader,
    matcher: DirectoryMatcher,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    staleness_threshold: Duration,
    /// `Some` exactly while a pass is running.
    in_flight: Mutex<Option<InFlight>>,
}

/// Coordinates contact reconciliation for one host application.
///
/// Cloning is cheap and clones share the cache and the in-flight pass.
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct ContactSync {
    inner: Arc<Inner>,
}

impl ContactSync {
    pub fn new(
        config: &SyncConfig,
        device: Arc<dyn DeviceContacts>,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self::with_clock(config, device, directory, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &SyncConfig,
        device: Arc<dyn DeviceContacts>,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let normalizer = PhoneNormalizer::new(config.default_country_code.clone());
        Self {
            inner: Arc::new(Inner {
                reader: DeviceContactReader::new(device, normalizer.clone()),
                matcher: DirectoryMatcher::new(
                    directory,
                    normalizer,
                    config.directory_batch_size,
                    config.directory_retry.clone(),
                ),
                store,
                clock,
                staleness_threshold: config.staleness_threshold,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Reconciled contacts, from the snapshot when it is fresh.
    pub async fn get_contacts(&self) -> Vec<ReconciledContact> {
        let contacts = self.request(false).await;
        (*contacts).clone()
    }

    /// Reconciled contacts from a new pass (or the one already running).
    pub async fn refresh(&self) -> Vec<ReconciledContact> {
        let contacts = self.request(true).await;
        (*contacts).clone()
    }

    /// Contacts that matched a directory user.
    pub async fn get_app_user_contacts(&self) -> Vec<ReconciledContact> {
        let mut contacts = self.get_contacts().await;
        contacts.retain(|c| c.is_known_user);
        contacts
    }

    /// Contacts whose name, username or a number contains `query`,
    /// ignoring case. An empty query matches everything.
    pub async fn search_local(&self, query: &str) -> Vec<ReconciledContact> {
        let needle = query.trim().to_lowercase();
        let mut contacts = self.get_contacts().await;
        if !needle.is_empty() {
            contacts.retain(|c| merge::matches_query(c, &needle));
        }
        contacts
    }

    /// Drop the persisted snapshot. A running pass is unaffected and will
    /// write its own snapshot when it finishes.
    pub async fn clear_cache(&self) {
        match self.inner.store.delete_snapshot().await {
            Ok(()) => debug!("contact snapshot cleared"),
            Err(e) => warn!(error = %e, "failed to clear contact snapshot"),
        }
    }

    pub fn state(&self) -> SyncState {
        if self.inner.lock_in_flight().is_some() {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    /// Timestamp of the persisted snapshot, if one can be read.
    pub async fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        match self.inner.store.read_snapshot().await {
            Ok(snapshot) => snapshot.map(|s| s.synced_at),
            Err(e) => {
                warn!(error = %e, "failed to read contact snapshot");
                None
            }
        }
    }

    async fn request(&self, force_sync: bool) -> PassResult {
        if let Some(pending) = self.inner.attach() {
            debug!("joining contact sync already in flight");
            return pending.await;
        }

        if !force_sync {
            if let Some(cached) = self.inner.cached_view().await {
                return cached;
            }
        }

        Inner::attach_or_start(&self.inner).await
    }
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self) -> Option<SharedPass> {
        self.lock_in_flight()
            .as_ref()
            .map(|in_flight| in_flight.result.clone())
    }

    /// Join the running pass, or start one. Checking and installing happen
    /// under one lock, so two callers can never both start a pass.
    fn attach_or_start(this: &Arc<Self>) -> SharedPass {
        let mut slot = this.lock_in_flight();
        if let Some(in_flight) = slot.as_ref() {
            return in_flight.result.clone();
        }

        let pass_id = Uuid::new_v4();
        let inner = Arc::clone(this);
        let handle = tokio::spawn(async move {
            let _clear = ClearOnDrop {
                inner: Arc::clone(&inner),
                pass_id,
            };
            inner.run_pass(pass_id).await
        });

        let result = async move {
            match handle.await {
                Ok(contacts) => contacts,
                Err(e) => {
                    let e = SyncError::from(e);
                    warn!(%pass_id, error = %e, "contact sync task died");
                    Arc::new(Vec::new())
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            pass_id,
            result: result.clone(),
        });
        result
    }

    async fn cached_view(&self) -> Option<PassResult> {
        let snapshot = match self.store.read_snapshot().await {
            Ok(snapshot) => snapshot?,
            Err(e) => {
                warn!(error = %e, "contact snapshot unreadable, treating as cache miss");
                return None;
            }
        };

        if !snapshot.is_fresh(self.clock.now(), self.staleness_threshold) {
            debug!(synced_at = %snapshot.synced_at, "contact snapshot is stale");
            return None;
        }

        debug!(
            pass_id = %snapshot.pass_id,
            contacts = snapshot.contacts.len(),
            "serving contacts from snapshot"
        );
        Some(Arc::new(merge(&snapshot.contacts, &snapshot.directory)))
    }

    async fn run_pass(&self, pass_id: Uuid) -> PassResult {
        info!(%pass_id, "contact sync started");
        match self.sync_once(pass_id).await {
            Ok(contacts) => {
                info!(
                    %pass_id,
                    contacts = contacts.len(),
                    known = contacts.iter().filter(|c| c.is_known_user).count(),
                    "contact sync finished"
                );
                Arc::new(contacts)
            }
            Err(e) => {
                warn!(%pass_id, error = %e, "contact sync failed");
                Arc::new(Vec::new())
            }
        }
    }

    async fn sync_once(&self, pass_id: Uuid) -> Result<Vec<ReconciledContact>, SyncError> {
        let contacts = self.reader.try_read_all().await?;

        let directory = if contacts.is_empty() {
            HashMap::new()
        } else {
            let phones: BTreeSet<CanonicalPhone> = contacts
                .iter()
                .flat_map(|c| c.phones.iter().cloned())
                .collect();
            self.matcher.find_by_phones(&phones).await
        };

        let snapshot = ReconciliationSnapshot {
            pass_id,
            synced_at: self.clock.now(),
            contacts,
            directory,
        };

        if let Err(e) = self.store.write_snapshot(&snapshot).await {
            warn!(
                %pass_id,
                error = %e,
                "failed to persist contact snapshot, next request will resync"
            );
        }

        Ok(merge(&snapshot.contacts, &snapshot.directory))
    }
}

/// Returns the coordinator to idle when its pass ends, panics included.
struct ClearOnDrop {
    inner: Arc<Inner>,
    pass_id: Uuid,
}

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        let mut slot = self.inner.lock_in_flight();
        if slot.as_ref().is_some_and(|f| f.pass_id == self.pass_id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::contacts::persistence::MemorySnapshotStore;
    use crate::contacts::testing::{
        raw_contact, user, BrokenStore, FakeDevice, FakeDirectory, ManualClock,
    };
    use crate::retry::RetryPolicy;

    struct Harness {
        sync: ContactSync,
        device: Arc<FakeDevice>,
        directory: Arc<FakeDirectory>,
        store: Arc<MemorySnapshotStore>,
        clock: Arc<ManualClock>,
    }

    fn config() -> SyncConfig {
        SyncConfig {
            directory_retry: RetryPolicy::none(),
            ..SyncConfig::default()
        }
    }

    fn harness(device: FakeDevice) -> Harness {
        let device = Arc::new(device);
        let directory = Arc::new(FakeDirectory::new(vec![
            user("sara", "97333334444"),
            user("omar", "+97399999999"),
        ]));
        let store = Arc::new(MemorySnapshotStore::new());
        let clock = Arc::new(ManualClock::new());
        let sync = ContactSync::with_clock(
            &config(),
            device.clone(),
            directory.clone(),
            store.clone(),
            clock.clone(),
        );
        Harness {
            sync,
            device,
            directory,
            store,
            clock,
        }
    }

    fn address_book() -> Vec<dialtone_shared::RawDeviceContact> {
        vec![
            raw_contact("1", "Sara", &["3333 4444"]),
            raw_contact("2", "Omar", &["1234 5678", "9999 9999"]),
            raw_contact("3", "Plumber", &["5555 1212"]),
            raw_contact("4", "Sara (work)", &["+973 3333 4444"]),
        ]
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_pass() {
        let h = harness(FakeDevice::new(address_book()));

        let (refreshed, listed) = tokio::join!(h.sync.refresh(), h.sync.get_contacts());

        assert_eq!(refreshed, listed);
        assert_eq!(refreshed.len(), 4);
        assert_eq!(h.device.reads(), 1);
        // 4 distinct numbers (the shared one is queried once): one batch.
        assert_eq!(h.directory.calls(), 1);
        assert_eq!(h.directory.batches()[0].len(), 4);
        assert_eq!(h.sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_merge_through_coordinator() {
        let h = harness(FakeDevice::new(address_book()));
        let contacts = h.sync.get_contacts().await;

        let omar = contacts.iter().find(|c| c.contact.id == "2").unwrap();
        assert!(omar.is_known_user);
        assert_eq!(omar.username(), Some("omar"));

        let plumber = contacts.iter().find(|c| c.contact.id == "3").unwrap();
        assert!(!plumber.is_known_user);

        let app_users = h.sync.get_app_user_contacts().await;
        let mut ids: Vec<&str> = app_users.iter().map(|c| c.contact.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[tokio::test]
    async fn test_fresh_snapshot_is_reused_until_stale() {
        let h = harness(FakeDevice::new(address_book()));

        let first = h.sync.get_contacts().await;
        let second = h.sync.get_contacts().await;
        assert_eq!(first, second);
        assert_eq!(h.device.reads(), 1);
        assert_eq!(h.directory.calls(), 1);

        h.clock.advance(Duration::from_secs(301));
        h.sync.get_contacts().await;
        assert_eq!(h.device.reads(), 2);
        assert_eq!(h.directory.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_ignores_fresh_snapshot() {
        let h = harness(FakeDevice::new(address_book()));
        h.sync.get_contacts().await;
        h.device.set_contacts(vec![raw_contact("9", "New", &["3333 4444"])]);

        let refreshed = h.sync.refresh().await;
        assert_eq!(refreshed.len(), 1);
        assert_eq!(h.device.reads(), 2);
        assert_eq!(h.sync.get_contacts().await, refreshed);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_pass() {
        let h = harness(FakeDevice::new(address_book()));
        h.sync.get_contacts().await;
        assert!(h.sync.last_synced_at().await.is_some());

        h.sync.clear_cache().await;
        assert!(h.sync.last_synced_at().await.is_none());

        h.sync.get_contacts().await;
        assert_eq!(h.device.reads(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_written_once_per_pass() {
        let h = harness(FakeDevice::new(address_book()));
        h.sync.refresh().await;

        let snapshot = h.store.read_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.contacts.len(), 4);
        assert_eq!(snapshot.directory.len(), 2);
        assert_eq!(snapshot.synced_at, h.clock.now());
    }

    #[tokio::test]
    async fn test_empty_address_book_skips_directory() {
        let h = harness(FakeDevice::new(vec![raw_contact("1", "No Phone", &[])]));

        assert!(h.sync.get_contacts().await.is_empty());
        assert_eq!(h.directory.calls(), 0);
        assert!(h.sync.last_synced_at().await.is_some());
    }

    #[tokio::test]
    async fn test_permission_denied_yields_empty_and_no_snapshot() {
        let h = harness(FakeDevice::new(address_book()).deny_permission());

        assert!(h.sync.get_contacts().await.is_empty());
        assert!(h.sync.last_synced_at().await.is_none());
        assert_eq!(h.directory.calls(), 0);
        assert_eq!(h.sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_failed_pass_returns_to_idle_and_retries() {
        let h = harness(FakeDevice::new(address_book()));
        h.device.set_list_failure(true);

        assert!(h.sync.get_contacts().await.is_empty());
        assert_eq!(h.sync.state(), SyncState::Idle);

        h.device.set_list_failure(false);
        assert_eq!(h.sync.get_contacts().await.len(), 4);
        assert_eq!(h.device.reads(), 2);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_result() {
        let device = Arc::new(FakeDevice::new(address_book()));
        let directory = Arc::new(FakeDirectory::new(vec![user("sara", "97333334444")]));
        let sync = ContactSync::new(&config(), device.clone(), directory, Arc::new(BrokenStore));

        let contacts = sync.get_contacts().await;
        assert_eq!(contacts.len(), 4);
        assert!(contacts.iter().any(|c| c.is_known_user));

        // Nothing was cached, so the next call resyncs.
        sync.get_contacts().await;
        assert_eq!(device.reads(), 2);
        sync.clear_cache().await;
        assert!(sync.last_synced_at().await.is_none());
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_stall_pass() {
        let h = harness(FakeDevice::new(address_book()).gated());

        let gave_up = tokio::time::timeout(Duration::from_millis(20), h.sync.refresh()).await;
        assert!(gave_up.is_err());
        assert_eq!(h.sync.state(), SyncState::Syncing);

        let waiter = {
            let sync = h.sync.clone();
            tokio::spawn(async move { sync.get_contacts().await })
        };
        tokio::task::yield_now().await;
        h.device.open_gate();

        let contacts = waiter.await.unwrap();
        assert_eq!(contacts.len(), 4);
        assert_eq!(h.device.reads(), 1);
        assert_eq!(h.sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_sqlite_snapshot_survives_restart() {
        use crate::contacts::persistence::SqliteSnapshotStore;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.db");
        let device = Arc::new(FakeDevice::new(address_book()));
        let directory = Arc::new(FakeDirectory::new(vec![user("sara", "97333334444")]));

        let first = {
            let store = Arc::new(SqliteSnapshotStore::open_at(&path).unwrap());
            let sync = ContactSync::new(&config(), device.clone(), directory.clone(), store);
            sync.get_contacts().await
        };

        let store = Arc::new(SqliteSnapshotStore::open_at(&path).unwrap());
        let restarted = ContactSync::new(&config(), device.clone(), directory.clone(), store);
        assert_eq!(restarted.get_contacts().await, first);
        assert_eq!(device.reads(), 1);
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_local() {
        let h = harness(FakeDevice::new(address_book()));

        let names = |found: Vec<ReconciledContact>| {
            let mut names: Vec<String> = found.into_iter().map(|c| c.contact.display_name).collect();
            names.sort();
            names
        };

        assert_eq!(names(h.sync.search_local("SARA").await), vec!["Sara", "Sara (work)"]);
        assert_eq!(names(h.sync.search_local("omar").await), vec!["Omar"]);
        assert_eq!(names(h.sync.search_local("5555").await), vec!["Plumber"]);
        assert_eq!(h.sync.search_local("  ").await.len(), 4);
        assert!(h.sync.search_local("nobody").await.is_empty());
        assert_eq!(h.device.reads(), 1);
    }
}
