use thiserror::Error;
use zmon_models::ErrorKind;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("signing key is not installed")]
    KeyNotInstalled,

    #[error("batch payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TelemetryError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            TelemetryError::KeyNotInstalled => ErrorKind::InfrastructureFailure,
            TelemetryError::Serialization(_) => ErrorKind::IntegrityViolation,
        }
    }
}
