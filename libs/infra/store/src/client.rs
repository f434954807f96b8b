//! Local store connection management: a shared `Database` handle plus,
//! for in-memory databases, an anchor connection kept alive for the life of
//! the store so libsql doesn't purge the schema between connections.

use std::sync::Arc;
use std::time::Instant;

use libsql::{Builder, Cipher, Connection, Database, EncryptionConfig};
use tracing::{info, instrument, warn};

use crate::error::StoreError;
use crate::migrations;

const SLOW_QUERY_THRESHOLD_MS: u128 = 50;

#[derive(Clone)]
pub struct Store {
    database: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl Store {
    /// Opens (creating if absent) the local encrypted store at `path`, or an
    /// in-memory store when `path` is `:memory:`. `encryption_key` is the
    /// 32-byte key derived by `zmon_crypto::derive_store_key`; the store
    /// never derives its own key.
    #[instrument(skip(encryption_key))]
    pub async fn connect(path: &str, encryption_key: &[u8; 32]) -> Result<Self, StoreError> {
        let is_memory = path == ":memory:";

        let mut builder = if is_memory {
            Builder::new_local(":memory:")
        } else {
            Builder::new_local(path)
        };
        if !is_memory {
            builder = builder.encryption_config(EncryptionConfig::new(Cipher::Aes256Cbc, encryption_key.to_vec().into()));
        }
        let database = builder
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let database = Arc::new(database);
        let mut anchor = None;

        if is_memory {
            let anchor_conn = database
                .connect()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            migrations::apply_all(&anchor_conn).await?;
            anchor = Some(Arc::new(anchor_conn));
        } else {
            let bootstrap_conn = database
                .connect()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            migrations::apply_all(&bootstrap_conn).await?;
        }

        info!(path, "local store ready");
        Ok(Self { database, _memory_anchor: anchor })
    }

    pub fn connection(&self) -> Result<Connection, StoreError> {
        self.database.connect().map_err(|e| StoreError::Connection(e.to_string()))
    }
}

/// Wraps a query/exec future with slow-query logging (>50ms).
pub(crate) async fn instrumented<T, Fut>(statement_id: &str, fut: Fut) -> Result<T, libsql::Error>
where
    Fut: std::future::Future<Output = Result<T, libsql::Error>>,
{
    let started = Instant::now();
    let result = fut.await;
    let elapsed = started.elapsed().as_millis();
    if elapsed > SLOW_QUERY_THRESHOLD_MS {
        warn!(statement_id, elapsed_ms = elapsed, "slow query");
    }
    result
}
