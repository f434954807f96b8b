//! Certificate record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Active,
    Expiring,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub serial: String,
    pub subject: String,
    pub issuer: String,
    pub not_before_ms: u64,
    pub not_after_ms: u64,
    pub status: CertificateStatus,
    pub sha256_fingerprint: String,
}
