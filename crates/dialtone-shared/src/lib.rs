//! # dialtone-shared
//!
//! Domain types and pure helpers shared by the Dialtone contact
//! reconciliation crates: phone number normalisation, the calling-code
//! table, and the records exchanged with device and directory collaborators.

pub mod calling_codes;
pub mod constants;
pub mod error;
pub mod phone;
pub mod types;

pub use phone::{CanonicalPhone, PhoneNormalizer};
pub use types::*;
