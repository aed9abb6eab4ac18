use thiserror::Error;

/// Failure reported by a user directory collaborator for one query.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Directory query rejected: {0}")]
    Rejected(String),

    #[error("Malformed directory record: {0}")]
    Malformed(String),
}

/// Failure reported by the platform address book.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Contacts permission denied")]
    PermissionDenied,

    #[error("Address book read failed: {0}")]
    ReadFailed(String),

    #[error("Platform error: {0}")]
    Platform(String),
}
