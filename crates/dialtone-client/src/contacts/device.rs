use std::sync::Arc;

use async_trait::async_trait;
use dialtone_shared::error::DeviceError;
use dialtone_shared::{CanonicalPhone, DeviceContact, PhoneNormalizer, RawDeviceContact};
use tracing::{debug, warn};

use crate::error::SyncError;

/// Platform address book.
#[async_trait]
pub trait DeviceContacts: Send + Sync {
    /// Ask for (or confirm) read access to the address book.
    async fn request_permission(&self) -> Result<bool, DeviceError>;

    /// Every address book entry, unfiltered.
    async fn list_contacts(&self) -> Result<Vec<RawDeviceContact>, DeviceError>;
}

/// Reads the address book and keeps the entries that can take part in
/// matching: those with at least one number that normalises.
#[derive(Clone)]
pub struct DeviceContactReader {
    source: Arc<dyn DeviceContacts>,
    normalizer: PhoneNormalizer,
}

impl DeviceContactReader {
    pub fn new(source: Arc<dyn DeviceContacts>, normalizer: PhoneNormalizer) -> Self {
        Self { source, normalizer }
    }

    /// `false` on denial and on any platform error.
    pub async fn request_permission(&self) -> bool {
        match self.source.request_permission().await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(error = %e, "contacts permission request failed");
                false
            }
        }
    }

    /// Snapshot of the address book; empty without permission or on error.
    pub async fn read_all(&self) -> Vec<DeviceContact> {
        match self.try_read_all().await {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(error = %e, "reading device contacts failed");
                Vec::new()
            }
        }
    }

    /// Like [`read_all`](Self::read_all) but reports why nothing was read.
    pub(crate) async fn try_read_all(&self) -> Result<Vec<DeviceContact>, SyncError> {
        if !self.request_permission().await {
            return Err(SyncError::PermissionDenied);
        }

        let raw = self.source.list_contacts().await?;
        let total = raw.len();

        let contacts: Vec<DeviceContact> = raw
            .into_iter()
            .filter(|c| c.phone_numbers.iter().any(|p| !p.trim().is_empty()))
            .filter_map(|c| self.to_device_contact(c))
            .collect();

        debug!(
            total,
            usable = contacts.len(),
            "read device address book"
        );
        Ok(contacts)
    }

    fn to_device_contact(&self, raw: RawDeviceContact) -> Option<DeviceContact> {
        let mut phones: Vec<CanonicalPhone> = Vec::with_capacity(raw.phone_numbers.len());
        for number in &raw.phone_numbers {
            match self.normalizer.normalize(number) {
                Some(phone) if !phones.contains(&phone) => phones.push(phone),
                Some(_) => {}
                None => debug!(contact = %raw.id, "skipping unparseable phone number"),
            }
        }

        if phones.is_empty() {
            debug!(contact = %raw.id, "dropping contact without a usable phone number");
            return None;
        }

        let display_name = display_name_for(&raw);
        Some(DeviceContact {
            id: raw.id,
            display_name,
            raw_phones: raw.phone_numbers,
            phones,
            avatar_uri: raw.avatar_uri,
        })
    }
}

/// Composite name, else given + family, else the first number.
fn display_name_for(raw: &RawDeviceContact) -> String {
    if let Some(name) = raw.display_name.as_deref().map(str::trim) {
        if !name.is_empty() {
            return name.to_string();
        }
    }

    let joined = [raw.given_name.as_deref(), raw.family_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !joined.is_empty() {
        return joined;
    }

    raw.phone_numbers
        .iter()
        .map(|p| p.trim())
        .find(|p| !p.is_empty())
        .unwrap_or_default()
        .to_string()
}
