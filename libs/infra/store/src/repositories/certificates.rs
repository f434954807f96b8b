//! Certificate store repository.

use libsql::params;
use tracing::instrument;
use zmon_models::{CertificateRecord, CertificateStatus};

use crate::client::Store;
use crate::error::StoreError;

pub struct CertificatesRepository {
    store: Store,
}

impl CertificatesRepository {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, record))]
    pub async fn upsert(&self, record: &CertificateRecord) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "INSERT INTO certificates (serial, subject, issuer, not_before_ms, not_after_ms, status, sha256_fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(serial) DO UPDATE SET status = excluded.status",
            params![
                record.serial.clone(),
                record.subject.clone(),
                record.issuer.clone(),
                record.not_before_ms as i64,
                record.not_after_ms as i64,
                status_str(record.status).to_string(),
                record.sha256_fingerprint.clone(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn revoke(&self, serial: &str) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "UPDATE certificates SET status = 'revoked' WHERE serial = ?1",
            params![serial],
        )
        .await?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<CertificateRecord>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT serial, subject, issuer, not_before_ms, not_after_ms, status, sha256_fingerprint FROM certificates",
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let serial: String = row.get(0)?;
            let subject: String = row.get(1)?;
            let issuer: String = row.get(2)?;
            let not_before_ms: i64 = row.get(3)?;
            let not_after_ms: i64 = row.get(4)?;
            let status: String = row.get(5)?;
            let sha256_fingerprint: String = row.get(6)?;
            out.push(CertificateRecord {
                serial,
                subject,
                issuer,
                not_before_ms: not_before_ms as u64,
                not_after_ms: not_after_ms as u64,
                status: parse_status(&status).map_err(StoreError::Mapping)?,
                sha256_fingerprint,
            });
        }
        Ok(out)
    }
}

fn status_str(status: CertificateStatus) -> &'static str {
    match status {
        CertificateStatus::Active => "active",
        CertificateStatus::Expiring => "expiring",
        CertificateStatus::Expired => "expired",
        CertificateStatus::Revoked => "revoked",
    }
}

fn parse_status(raw: &str) -> Result<CertificateStatus, String> {
    match raw {
        "active" => Ok(CertificateStatus::Active),
        "expiring" => Ok(CertificateStatus::Expiring),
        "expired" => Ok(CertificateStatus::Expired),
        "revoked" => Ok(CertificateStatus::Revoked),
        other => Err(format!("unknown certificate status: {other}")),
    }
}
