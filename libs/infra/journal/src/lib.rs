//! Hash-chained action/security audit log.

pub mod canonical;
pub mod error;
pub mod journal;

pub use canonical::{canonical_bytes, hash_entry};
pub use error::JournalError;
pub use journal::{Actor, Journal};
