//! Alarm repository.

use libsql::params;
use tracing::instrument;
use zmon_models::{AlarmEvent, AlarmKind, AlarmPriority, AlarmStatus};

use crate::client::Store;
use crate::error::StoreError;

pub struct AlarmsRepository {
    store: Store,
}

impl AlarmsRepository {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, event))]
    pub async fn upsert(&self, event: &AlarmEvent) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "INSERT INTO alarms (id, patient_mrn, kind, priority, status, start_wall_time_ms,
                triggering_value, threshold_value, ack_user, ack_wall_time_ms,
                silence_expiry_wall_time_ms, escalation_level, context_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                ack_user = excluded.ack_user,
                ack_wall_time_ms = excluded.ack_wall_time_ms,
                silence_expiry_wall_time_ms = excluded.silence_expiry_wall_time_ms,
                escalation_level = excluded.escalation_level,
                priority = excluded.priority",
            params![
                event.id.clone(),
                event.patient_id.clone(),
                event.kind.as_str().to_string(),
                priority_str(event.priority).to_string(),
                status_str(event.status).to_string(),
                event.start_wall_time_ms as i64,
                event.triggering_value,
                event.threshold_value,
                event.ack_user.clone(),
                event.ack_wall_time_ms.map(|v| v as i64),
                event.silence_expiry_wall_time_ms.map(|v| v as i64),
                event.escalation_level,
                event.context.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn active_for_patient(&self, patient_mrn: &str) -> Result<Vec<AlarmEvent>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, kind, priority, status, start_wall_time_ms, triggering_value,
                    threshold_value, ack_user, ack_wall_time_ms, silence_expiry_wall_time_ms,
                    escalation_level, context_json
                 FROM alarms WHERE patient_mrn = ?1 AND status != 'resolved'",
                params![patient_mrn],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_alarm(patient_mrn, &row)?);
        }
        Ok(out)
    }
}

fn row_to_alarm(patient_mrn: &str, row: &libsql::Row) -> Result<AlarmEvent, StoreError> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let priority: String = row.get(2)?;
    let status: String = row.get(3)?;
    let start_wall_time_ms: i64 = row.get(4)?;
    let triggering_value: f64 = row.get(5)?;
    let threshold_value: f64 = row.get(6)?;
    let ack_user: Option<String> = row.get(7)?;
    let ack_wall_time_ms: Option<i64> = row.get(8)?;
    let silence_expiry_wall_time_ms: Option<i64> = row.get(9)?;
    let escalation_level: i64 = row.get(10)?;
    let context_json: String = row.get(11)?;

    Ok(AlarmEvent {
        id,
        patient_id: patient_mrn.to_string(),
        kind: AlarmKind::Other(kind),
        priority: parse_priority(&priority).map_err(StoreError::Mapping)?,
        status: parse_status(&status).map_err(StoreError::Mapping)?,
        start_wall_time_ms: start_wall_time_ms as u64,
        triggering_value,
        threshold_value,
        ack_user,
        ack_wall_time_ms: ack_wall_time_ms.map(|v| v as u64),
        silence_expiry_wall_time_ms: silence_expiry_wall_time_ms.map(|v| v as u64),
        escalation_level: escalation_level as u32,
        context: serde_json::from_str(&context_json).unwrap_or(serde_json::json!({})),
    })
}

fn priority_str(priority: AlarmPriority) -> &'static str {
    match priority {
        AlarmPriority::Low => "low",
        AlarmPriority::Medium => "medium",
        AlarmPriority::High => "high",
    }
}

fn parse_priority(raw: &str) -> Result<AlarmPriority, String> {
    match raw {
        "low" => Ok(AlarmPriority::Low),
        "medium" => Ok(AlarmPriority::Medium),
        "high" => Ok(AlarmPriority::High),
        other => Err(format!("unknown alarm priority: {other}")),
    }
}

fn status_str(status: AlarmStatus) -> &'static str {
    match status {
        AlarmStatus::Active => "active",
        AlarmStatus::Acknowledged => "acknowledged",
        AlarmStatus::Silenced => "silenced",
        AlarmStatus::Resolved => "resolved",
    }
}

fn parse_status(raw: &str) -> Result<AlarmStatus, String> {
    match raw {
        "active" => Ok(AlarmStatus::Active),
        "acknowledged" => Ok(AlarmStatus::Acknowledged),
        "silenced" => Ok(AlarmStatus::Silenced),
        "resolved" => Ok(AlarmStatus::Resolved),
        other => Err(format!("unknown alarm status: {other}")),
    }
}
