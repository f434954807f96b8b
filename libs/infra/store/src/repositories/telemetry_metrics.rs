//! Telemetry batch repository.
//!
//! Persists sealed batches for replay after a transport outage; the
//! full vitals/alarms payload is kept as JSON (`payload_json`) rather than
//! normalized, since it's written once and read back only for retry or
//! audit, never queried by field.

use libsql::params;
use tracing::instrument;
use zmon_models::{TelemetryBatch, TelemetryStatus};

use crate::client::Store;
use crate::error::StoreError;

pub struct TelemetryRepository {
    store: Store,
}

impl TelemetryRepository {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, batch))]
    pub async fn insert(&self, batch: &TelemetryBatch) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        let payload_json = serde_json::to_string(batch).map_err(|e| StoreError::Mapping(e.to_string()))?;
        conn.execute(
            "INSERT INTO telemetry_metrics (id, patient_mrn, oldest_wall_time_ms, newest_wall_time_ms,
                created_wall_time_ms, signed_wall_time_ms, status, retry_count, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                batch.id.clone(),
                batch.patient_id.clone(),
                batch.oldest_wall_time_ms as i64,
                batch.newest_wall_time_ms as i64,
                batch.created_wall_time_ms as i64,
                batch.signed_wall_time_ms as i64,
                status_str(batch.status).to_string(),
                batch.retry_count,
                payload_json,
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn update_status(&self, id: &str, status: TelemetryStatus, retry_count: u32) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "UPDATE telemetry_metrics SET status = ?2, retry_count = ?3 WHERE id = ?1",
            params![id, status_str(status).to_string(), retry_count],
        )
        .await?;
        Ok(())
    }

    pub async fn pending(&self) -> Result<Vec<TelemetryBatch>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT payload_json FROM telemetry_metrics WHERE status IN ('pending', 'failed')
                 ORDER BY created_wall_time_ms ASC",
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload_json: String = row.get(0)?;
            let batch: TelemetryBatch =
                serde_json::from_str(&payload_json).map_err(|e| StoreError::Mapping(e.to_string()))?;
            out.push(batch);
        }
        Ok(out)
    }
}

fn status_str(status: TelemetryStatus) -> &'static str {
    match status {
        TelemetryStatus::Pending => "pending",
        TelemetryStatus::InFlight => "in_flight",
        TelemetryStatus::Acknowledged => "acknowledged",
        TelemetryStatus::Failed => "failed",
        TelemetryStatus::OverflowDropped => "overflow_dropped",
    }
}
