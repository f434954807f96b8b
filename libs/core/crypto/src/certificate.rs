//! Certificate chain validation against the installed trust anchor:
//! chain, validity window, revocation, and subject match.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;

use crate::error::CryptoError;
use zmon_models::{CertificateRecord, CertificateStatus};

const EXPIRY_WARNING_DAYS: i64 = 30;
const EXPIRY_ERROR_DAYS: i64 = 7;

/// Locally cached revocation list, refreshed by the orchestrator every 24h.
#[derive(Default)]
pub struct RevocationList {
    serials: HashSet<String>,
}

impl RevocationList {
    #[must_use]
    pub fn new(serials: impl IntoIterator<Item = String>) -> Self {
        Self { serials: serials.into_iter().collect() }
    }

    #[must_use]
    pub fn is_revoked(&self, serial: &str) -> bool {
        self.serials.contains(serial)
    }
}

/// Validates `cert_pem` against `trust_anchor_pem`: signature chain,
/// not-before/not-after window, revocation, and subject match against
/// `device_id`. Returns a `CertificateRecord` reflecting current status.
pub fn validate(
    cert_pem: &str,
    trust_anchor_pem: &str,
    revocation: &RevocationList,
    device_id: &str,
    now_ms: u64,
) -> Result<CertificateRecord, CryptoError> {
    let (_, cert_pem_block) =
        parse_x509_pem(cert_pem.as_bytes()).map_err(|e| CryptoError::CertificateParse(e.to_string()))?;
    let (_, cert) = X509Certificate::from_der(&cert_pem_block.contents)
        .map_err(|e| CryptoError::CertificateParse(e.to_string()))?;

    let (_, anchor_pem_block) = parse_x509_pem(trust_anchor_pem.as_bytes())
        .map_err(|e| CryptoError::CertificateParse(e.to_string()))?;
    let (_, anchor) = X509Certificate::from_der(&anchor_pem_block.contents)
        .map_err(|e| CryptoError::CertificateParse(e.to_string()))?;

    cert.verify_signature(Some(anchor.public_key())).map_err(|_| CryptoError::ChainInvalid)?;

    let serial = cert.raw_serial_as_string();
    if revocation.is_revoked(&serial) {
        return Err(CryptoError::Revoked(serial));
    }

    let subject = cert.subject().to_string();
    if !subject.contains(device_id) {
        return Err(CryptoError::SubjectMismatch { expected: device_id.to_string(), actual: subject });
    }

    let not_before_ms = (cert.validity().not_before.timestamp() as u64).saturating_mul(1_000);
    let not_after_ms = (cert.validity().not_after.timestamp() as u64).saturating_mul(1_000);

    if now_ms < not_before_ms {
        return Err(CryptoError::NotYetValid);
    }

    let remaining_days = (not_after_ms.saturating_sub(now_ms) / 1_000 / 86_400) as i64;
    let status = if now_ms > not_after_ms {
        CertificateStatus::Expired
    } else if remaining_days <= EXPIRY_ERROR_DAYS {
        CertificateStatus::Expiring
    } else if remaining_days <= EXPIRY_WARNING_DAYS {
        CertificateStatus::Expiring
    } else {
        CertificateStatus::Active
    };

    if status == CertificateStatus::Expired {
        return Err(CryptoError::Expired);
    }

    let issuer = cert.issuer().to_string();
    let mut hasher = Sha256::new();
    hasher.update(&cert_pem_block.contents);
    let fingerprint = hex::encode(hasher.finalize());

    Ok(CertificateRecord {
        serial,
        subject,
        issuer,
        not_before_ms,
        not_after_ms,
        status,
        sha256_fingerprint: fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revocation_list_matches_known_serials() {
        let list = RevocationList::new(["AA:BB:CC".to_string()]);
        assert!(list.is_revoked("AA:BB:CC"));
        assert!(!list.is_revoked("DD:EE:FF"));
    }
}
