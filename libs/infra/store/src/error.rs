//! Errors surfaced by the local store, mapped to `ErrorKind` for the
//! orchestrator's propagation policy.

use thiserror::Error;
use zmon_models::ErrorKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection to the local database failed: {0}")]
    Connection(String),

    #[error("the store is unavailable")]
    StoreUnavailable,

    #[error("the store has no remaining disk space")]
    StoreFull,

    #[error("query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("migration {0} failed: {1}")]
    Migration(u32, String),

    #[error("row mapping failed: {0}")]
    Mapping(String),

    #[error("transaction rolled back: {0}")]
    Transaction(String),
}

impl StoreError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Connection(_) | StoreError::Migration(..) => ErrorKind::InfrastructureFailure,
            StoreError::StoreUnavailable => ErrorKind::Transient,
            StoreError::StoreFull => ErrorKind::ResourceExhaustion,
            StoreError::Query(_) | StoreError::Mapping(_) | StoreError::Transaction(_) => {
                ErrorKind::InfrastructureFailure
            }
        }
    }
}
