use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phone::CanonicalPhone;

// ---------------------------------------------------------------------------
// Device address book
// ---------------------------------------------------------------------------

/// An address book entry exactly as the platform reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawDeviceContact {
    /// Platform-local identifier.
    pub id: String,
    /// Composite display name, when the platform provides one.
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Phone numbers as stored on the device, unnormalised.
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    pub avatar_uri: Option<String>,
}

/// A device contact with at least one number that normalised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContact {
    pub id: String,
    pub display_name: String,
    /// Every number from the address book entry, as written.
    pub raw_phones: Vec<String>,
    /// Numbers that normalised, in address-book order without duplicates.
    /// Never empty.
    pub phones: Vec<CanonicalPhone>,
    pub avatar_uri: Option<String>,
}

// ---------------------------------------------------------------------------
// Remote user directory
// ---------------------------------------------------------------------------

/// A user profile as stored by the remote directory.
///
/// Directory documents are loosely shaped, so everything except the user id
/// is optional or defaulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUserRecord {
    pub user_id: String,
    /// Phone number as the directory persisted it (may lack `+` or zeros).
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    /// Last activity, Unix epoch milliseconds.
    #[serde(default)]
    pub last_seen_epoch: Option<i64>,
}

impl DirectoryUserRecord {
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen_epoch.and_then(DateTime::from_timestamp_millis)
    }
}

// ---------------------------------------------------------------------------
// Reconciled view
// ---------------------------------------------------------------------------

/// A device contact merged with the directory user it matched, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledContact {
    pub contact: DeviceContact,
    pub user: Option<DirectoryUserRecord>,
    /// The contact number that produced the match.
    pub matched_phone: Option<CanonicalPhone>,
    pub is_known_user: bool,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl ReconciledContact {
    pub fn display_name(&self) -> &str {
        &self.contact.display_name
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.username.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Persisted result of one reconciliation pass. Replaced whole, never
/// patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSnapshot {
    /// Id of the pass that produced this snapshot.
    pub pass_id: Uuid,
    pub synced_at: DateTime<Utc>,
    pub contacts: Vec<DeviceContact>,
    pub directory: HashMap<CanonicalPhone, DirectoryUserRecord>,
}

impl ReconciliationSnapshot {
    /// Age at `now`; `None` when the timestamp lies in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let age = now.signed_duration_since(self.synced_at);
        (age >= chrono::Duration::zero()).then_some(age)
    }

    /// Fresh iff `0 <= age < threshold`.
    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: std::time::Duration) -> bool {
        match (self.age(now), chrono::Duration::from_std(threshold)) {
            (Some(age), Ok(threshold)) => age < threshold,
            // Threshold too large to represent: anything in the past is fresh.
            (Some(_), Err(_)) => true,
            (None, _) => false,
        }
    }
}
