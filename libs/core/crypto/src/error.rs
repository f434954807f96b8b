//! Crypto error taxonomy.

use thiserror::Error;
use zmon_models::ErrorKind;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("base64 decode failed: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("certificate parse failed: {0}")]
    CertificateParse(String),

    #[error("certificate does not chain to the installed trust anchor")]
    ChainInvalid,

    #[error("certificate not yet valid (not_before in the future)")]
    NotYetValid,

    #[error("certificate has expired")]
    Expired,

    #[error("certificate serial {0} is on the revocation list")]
    Revoked(String),

    #[error("certificate subject {actual} does not match configured device identifier {expected}")]
    SubjectMismatch { expected: String, actual: String },

    #[error("signing key handle is not loaded")]
    KeyNotLoaded,
}

impl CryptoError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::Encoding(_) | CryptoError::CertificateParse(_) => ErrorKind::IntegrityViolation,
            CryptoError::ChainInvalid
            | CryptoError::NotYetValid
            | CryptoError::Expired
            | CryptoError::Revoked(_)
            | CryptoError::SubjectMismatch { .. } => ErrorKind::IntegrityViolation,
            CryptoError::KeyNotLoaded => ErrorKind::InfrastructureFailure,
        }
    }
}
