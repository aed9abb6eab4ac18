use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No home directory to derive the data directory from.
    #[error("no platform data directory for the snapshot database")]
    NoDataDir,

    #[error("snapshot database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    /// Stored contacts or directory matches are not valid JSON.
    #[error("snapshot column is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored pass id is not a UUID: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("stored sync time is not RFC 3339: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
