//! # dialtone-client
//!
//! Contact reconciliation for the Dialtone messaging client: reads the
//! device address book, matches its numbers against the remote user
//! directory and caches the merged result.
//!
//! The entry point is [`ContactSync`]; its collaborators (address book,
//! directory, snapshot storage) are traits the host application implements.

pub mod config;
pub mod contacts;
pub mod error;
pub mod retry;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::SyncConfig;
pub use contacts::{
    Clock, ContactSync, DeviceContactReader, DeviceContacts, DirectoryMatcher,
    MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore, SyncState, SystemClock,
    UserDirectory,
};
pub use error::SyncError;
pub use retry::{Backoff, RetryPolicy};

/// Install the fmt subscriber, honouring `RUST_LOG`.
///
/// Does nothing if the host already installed a global subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dialtone_client=debug,dialtone_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if installed.is_ok() {
        tracing::info!("Dialtone contact sync logging initialised");
    }
}
