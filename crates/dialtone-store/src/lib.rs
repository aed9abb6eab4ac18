//! # dialtone-store
//!
//! Local SQLite storage for the Dialtone contact subsystem.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the persisted
//! contact reconciliation snapshot. Async callers are expected to move calls
//! onto a blocking thread.

pub mod database;
pub mod migrations;
pub mod snapshots;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
