//! Security audit log repository.

use libsql::params;
use tracing::instrument;

use crate::client::Store;
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct SecurityAuditEntry {
    pub timestamp_ms: u64,
    pub event_kind: String,
    pub severity: String,
    pub user_id: Option<String>,
    pub success: bool,
    pub previous_hash: String,
}

pub struct SecurityAuditLogRepository {
    store: Store,
}

impl SecurityAuditLogRepository {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, entry))]
    pub async fn append(&self, entry: &SecurityAuditEntry) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "INSERT INTO security_audit_log (timestamp_ms, event_kind, severity, user_id, success_bool, previous_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.timestamp_ms as i64,
                entry.event_kind.clone(),
                entry.severity.clone(),
                entry.user_id.clone(),
                entry.success as i64,
                entry.previous_hash.clone(),
            ],
        )
        .await?;
        Ok(conn.last_insert_rowid() as u64)
    }

    pub async fn last_hash(&self) -> Result<String, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query("SELECT previous_hash FROM security_audit_log ORDER BY id DESC LIMIT 1", ())
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Ok(zmon_models::GENESIS_HASH.to_string())
        }
    }
}
