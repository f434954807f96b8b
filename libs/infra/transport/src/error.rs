use thiserror::Error;
use zmon_models::ErrorKind;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("tls configuration failed: {0}")]
    TlsConfig(String),

    #[error("certificate expired, refusing to connect")]
    CertificateExpired,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("server rejected the batch: {0}")]
    ServerRejected(String),

    #[error("batch exceeded the maximum retry count")]
    RetriesExhausted,
}

impl TransportError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::TlsConfig(_) | TransportError::Connection(_) => {
                ErrorKind::InfrastructureFailure
            }
            TransportError::CertificateExpired => ErrorKind::PolicyViolation,
            TransportError::Timeout(_) => ErrorKind::Transient,
            TransportError::ServerRejected(_) => ErrorKind::PersistentExternal,
            TransportError::RetriesExhausted => ErrorKind::PersistentExternal,
        }
    }
}
