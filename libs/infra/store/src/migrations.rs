//! Numbered, idempotent schema migrations. Each migration
//! runs inside a single transaction the store wraps; migration files must
//! not contain explicit `BEGIN`/`COMMIT`.

use libsql::Connection;
use tracing::{info, instrument};

use crate::error::StoreError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "init",
    sql: include_str!("../migrations/0001_init.sql"),
}];

#[instrument(skip(conn))]
pub async fn apply_all(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at_ms INTEGER NOT NULL)",
        (),
    )
    .await?;

    let mut rows = conn.query("SELECT version FROM schema_version", ()).await?;
    let mut applied = std::collections::HashSet::new();
    while let Some(row) = rows.next().await? {
        applied.insert(row.get::<i64>(0)? as u32);
    }

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        info!(version = migration.version, name = migration.name, "applying migration");
        let tx = conn
            .transaction()
            .await
            .map_err(|e| StoreError::Migration(migration.version, e.to_string()))?;
        tx.execute_batch(migration.sql)
            .await
            .map_err(|e| StoreError::Migration(migration.version, e.to_string()))?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at_ms) VALUES (?1, ?2)",
            libsql::params![migration.version, now_ms()],
        )
        .await
        .map_err(|e| StoreError::Migration(migration.version, e.to_string()))?;
        tx.commit().await.map_err(|e| StoreError::Migration(migration.version, e.to_string()))?;
    }
    Ok(())
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
