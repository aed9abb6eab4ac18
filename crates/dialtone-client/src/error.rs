use dialtone_shared::error::{DeviceError, DirectoryError};
use dialtone_store::StoreError;
use thiserror::Error;

/// Errors raised inside a reconciliation pass.
///
/// None of these escape [`ContactSync`](crate::ContactSync)'s public
/// operations; they are logged and turned into empty results.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Contacts permission not granted")]
    PermissionDenied,

    #[error("Device contacts error: {0}")]
    Device(#[from] DeviceError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Snapshot persistence error: {0}")]
    Persistence(String),

    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::TaskFailed(e.to_string())
    }
}
