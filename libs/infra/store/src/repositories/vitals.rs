//! Vitals repository.

use libsql::params;
use tracing::instrument;
use zmon_models::{MetricKind, Quality, VitalRecord};

use crate::client::{instrumented, Store};
use crate::error::StoreError;
use crate::statements::StatementId;

pub struct VitalsRepository {
    store: Store,
}

impl VitalsRepository {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, record))]
    pub async fn insert(&self, id: &str, batch_id: Option<&str>, record: &VitalRecord) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        instrumented(
            StatementId::VitalsInsert.as_str(),
            conn.execute(
                "INSERT INTO vitals (id, timestamp_ms, patient_mrn, metric_kind, value, quality, device_id, batch_id, persisted_bool)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
                params![
                    id,
                    record.wall_time_ms as i64,
                    record.patient_id.clone(),
                    record.metric.as_str().to_string(),
                    record.value,
                    quality_str(record.quality).to_string(),
                    record.device_id.clone(),
                    batch_id.map(str::to_string),
                ],
            ),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn recent_for_patient(&self, patient_mrn: &str, limit: u32) -> Result<Vec<VitalRecord>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT timestamp_ms, patient_mrn, metric_kind, value, quality, device_id
                 FROM vitals WHERE patient_mrn = ?1 ORDER BY timestamp_ms DESC LIMIT ?2",
                params![patient_mrn, limit],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let wall_time_ms: i64 = row.get(0)?;
            let patient_id: String = row.get(1)?;
            let metric_kind: String = row.get(2)?;
            let value: f64 = row.get(3)?;
            let quality: String = row.get(4)?;
            let device_id: String = row.get(5)?;
            out.push(VitalRecord {
                monotonic_ns: 0,
                wall_time_ms: wall_time_ms as u64,
                patient_id,
                metric: MetricKind::parse(&metric_kind),
                value,
                unit: String::new(),
                quality: parse_quality(&quality).map_err(StoreError::Mapping)?,
                sensor_origin: String::new(),
                device_id,
            });
        }
        Ok(out)
    }

    /// Marks every vital currently tagged with `batch_id` as persisted,
    /// once its telemetry batch has been acknowledged by the cloud side.
    pub async fn mark_persisted(&self, batch_id: &str) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "UPDATE vitals SET persisted_bool = 1 WHERE batch_id = ?1",
            params![batch_id],
        )
        .await?;
        Ok(())
    }
}

fn quality_str(quality: Quality) -> &'static str {
    match quality {
        Quality::Good => "good",
        Quality::Fair => "fair",
        Quality::Poor => "poor",
        Quality::Invalid => "invalid",
    }
}

fn parse_quality(raw: &str) -> Result<Quality, String> {
    match raw {
        "good" => Ok(Quality::Good),
        "fair" => Ok(Quality::Fair),
        "poor" => Ok(Quality::Poor),
        "invalid" => Ok(Quality::Invalid),
        other => Err(format!("unknown quality tag: {other}")),
    }
}
