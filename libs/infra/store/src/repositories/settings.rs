//! Settings key-value repository: upsert-by-key over a flat table.

use libsql::params;
use tracing::instrument;

use crate::client::Store;
use crate::error::StoreError;

pub struct SettingsRepository {
    store: Store,
}

impl SettingsRepository {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn.query("SELECT value FROM settings WHERE key = ?1", params![key]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str, updated_at_ms: u64) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
            params![key, value, updated_at_ms as i64],
        )
        .await?;
        Ok(())
    }
}
