//! Collaborator fakes shared by the contact tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dialtone_shared::error::{DeviceError, DirectoryError};
use dialtone_shared::phone::normalize;
use dialtone_shared::{CanonicalPhone, DeviceContact, DirectoryUserRecord, RawDeviceContact};
use tokio::sync::Notify;

use super::device::DeviceContacts;
use super::directory::UserDirectory;
use super::persistence::SnapshotStore;
use super::sync::Clock;
use crate::error::SyncError;
use dialtone_shared::ReconciliationSnapshot;

pub(crate) fn phone(raw: &str) -> CanonicalPhone {
    normalize(raw, "973").expect("test phone must normalise")
}

pub(crate) fn raw_contact(id: &str, name: &str, numbers: &[&str]) -> RawDeviceContact {
    RawDeviceContact {
        id: id.to_string(),
        display_name: (!name.is_empty()).then(|| name.to_string()),
        phone_numbers: numbers.iter().map(|n| n.to_string()).collect(),
        ..Default::default()
    }
}

pub(crate) fn device_contact(id: &str, name: &str, numbers: &[&str]) -> DeviceContact {
    DeviceContact {
        id: id.to_string(),
        display_name: name.to_string(),
        raw_phones: numbers.iter().map(|n| n.to_string()).collect(),
        phones: numbers.iter().map(|n| phone(n)).collect(),
        avatar_uri: None,
    }
}

pub(crate) fn user(id: &str, stored_phone: &str) -> DirectoryUserRecord {
    DirectoryUserRecord {
        user_id: id.to_string(),
        phone: Some(stored_phone.to_string()),
        username: Some(id.to_string()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

pub(crate) struct FakeDevice {
    contacts: Mutex<Vec<RawDeviceContact>>,
    permission: Result<bool, ()>,
    fail_list: AtomicBool,
    reads: AtomicUsize,
    gate: Option<Notify>,
}

impl FakeDevice {
    pub(crate) fn new(contacts: Vec<RawDeviceContact>) -> Self {
        Self {
            contacts: Mutex::new(contacts),
            permission: Ok(true),
            fail_list: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub(crate) fn deny_permission(mut self) -> Self {
        self.permission = Ok(false);
        self
    }

    pub(crate) fn permission_error(mut self) -> Self {
        self.permission = Err(());
        self
    }

    /// Hold every `list_contacts` call until [`FakeDevice::open_gate`].
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub(crate) fn set_list_failure(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_contacts(&self, contacts: Vec<RawDeviceContact>) {
        *self.contacts.lock().unwrap() = contacts;
    }

    /// Number of `list_contacts` calls so far.
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceContacts for FakeDevice {
    async fn request_permission(&self) -> Result<bool, DeviceError> {
        self.permission
            .map_err(|()| DeviceError::Platform("permission service crashed".into()))
    }

    async fn list_contacts(&self) -> Result<Vec<RawDeviceContact>, DeviceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(DeviceError::ReadFailed("address book locked".into()));
        }
        Ok(self.contacts.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

pub(crate) struct FakeDirectory {
    records: Vec<DirectoryUserRecord>,
    poison: Option<String>,
    fail_first: usize,
    return_everything: bool,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
}

impl FakeDirectory {
    pub(crate) fn new(records: Vec<DirectoryUserRecord>) -> Self {
        Self {
            records,
            poison: None,
            fail_first: 0,
            return_everything: false,
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Fail every batch that contains `value`.
    pub(crate) fn fail_batches_containing(mut self, value: &str) -> Self {
        self.poison = Some(value.to_string());
        self
    }

    /// Fail the first `n` calls, whatever they ask for.
    pub(crate) fn fail_first_calls(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Ignore the query and return every record.
    pub(crate) fn return_everything(mut self) -> Self {
        self.return_everything = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn query_by_phone_batch(
        &self,
        phones: &[String],
        max_batch_size: usize,
    ) -> Result<Vec<DirectoryUserRecord>, DirectoryError> {
        assert!(phones.len() <= max_batch_size, "batch over the fan-out limit");
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(phones.to_vec());
        tokio::task::yield_now().await;

        if call < self.fail_first {
            return Err(DirectoryError::Unavailable("transient".into()));
        }
        if let Some(poison) = &self.poison {
            if phones.contains(poison) {
                return Err(DirectoryError::Rejected("bad batch".into()));
            }
        }
        if self.return_everything {
            return Ok(self.records.clone());
        }

        Ok(self
            .records
            .iter()
            .filter(|r| {
                r.phone
                    .as_deref()
                    .and_then(|p| normalize(p, "973"))
                    .is_some_and(|p| phones.iter().any(|q| q == p.as_str()))
            })
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Persistence and time
// ---------------------------------------------------------------------------

/// A store whose reads and writes always fail.
pub(crate) struct BrokenStore;

#[async_trait]
impl SnapshotStore for BrokenStore {
    async fn read_snapshot(&self) -> Result<Option<ReconciliationSnapshot>, SyncError> {
        Err(SyncError::Persistence("disk unreadable".into()))
    }

    async fn write_snapshot(&self, _snapshot: &ReconciliationSnapshot) -> Result<(), SyncError> {
        Err(SyncError::Persistence("disk full".into()))
    }

    async fn delete_snapshot(&self) -> Result<(), SyncError> {
        Err(SyncError::Persistence("disk unreadable".into()))
    }
}

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub(crate) fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
