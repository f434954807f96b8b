use thiserror::Error;
use zmon_models::ErrorKind;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("audit chain broken at entry {at_entry}")]
    ChainBroken { at_entry: u64 },

    #[error(transparent)]
    Store(#[from] zmon_store::StoreError),
}

impl JournalError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            JournalError::ChainBroken { .. } => ErrorKind::IntegrityViolation,
            JournalError::Store(e) => e.kind(),
        }
    }
}
