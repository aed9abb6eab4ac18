//! Device contact reconciliation.
//!
//! [`DeviceContactReader`] and [`DirectoryMatcher`] wrap the two remote
//! collaborators, `merge` joins their output, and [`ContactSync`] caches the
//! joined view and makes sure only one pass runs at a time.

mod device;
mod directory;
mod merge;
mod persistence;
mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use device::{DeviceContactReader, DeviceContacts};
pub use directory::{DirectoryMatcher, UserDirectory};
pub use merge::merge;
pub use persistence::{MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
pub use sync::{Clock, ContactSync, SyncState, SystemClock};
