//! Database context: owns every blocking store write —
//! vitals/alarms/telemetry persistence, retention sweeps, and the action
//! journal. The real-time context never touches these directly; it hands
//! work off over the channels wired in `orchestrator.rs`.

use std::time::{SystemTime, UNIX_EPOCH};

use libsql::params;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use zmon_journal::Actor;
use zmon_models::{ActionKind, ActionOutcome, AlarmStatus, RetentionPolicy, TelemetryStatus};
use zmon_transport::TransportEvent;
use zmon_watchdog::Heartbeat;

use crate::contexts::real_time::RealTimeEvent;
use crate::shutdown::ShutdownSignal;
use crate::state::AppState;

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3_600);
/// Default persistence scheduler cadence. `THRESHOLD_POLL_INTERVAL`
/// checks the early-drain triggers far more often without itself doing
/// any I/O unless one fires.
const PERSISTENCE_TICK_INTERVAL: Duration = Duration::from_secs(600);
const THRESHOLD_POLL_INTERVAL: Duration = Duration::from_secs(1);
const WATCHDOG_CHECK_INTERVAL: Duration = Duration::from_millis(zmon_watchdog::CHECK_CADENCE_MS);

/// Persistence scheduler chunk size and early-drain thresholds.
const PERSISTENCE_CHUNK_SIZE: usize = 10_000;
const UNPERSISTED_RECORD_THRESHOLD: usize = 10_000;
const CACHE_UTILIZATION_THRESHOLD: f64 = 0.8;

const INITIAL_BACKOFF: Duration = Duration::from_secs(30);
const MAX_BACKOFF: Duration = Duration::from_secs(900);

fn now_wall_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Tracks the persistence scheduler's backoff state across ticks. A
/// `next_attempt_ms` in the future means a prior chunk write failed and
/// the scheduler is waiting out its backoff before retrying.
struct PersistenceBackoff {
    next_attempt_ms: u64,
    current_backoff: Duration,
}

impl Default for PersistenceBackoff {
    fn default() -> Self {
        Self { next_attempt_ms: 0, current_backoff: INITIAL_BACKOFF }
    }
}

impl PersistenceBackoff {
    fn is_waiting(&self, now_ms: u64) -> bool {
        now_ms < self.next_attempt_ms
    }

    fn record_failure(&mut self, now_ms: u64) {
        self.next_attempt_ms = now_ms + self.current_backoff.as_millis() as u64;
        self.current_backoff = (self.current_backoff * 2).min(MAX_BACKOFF);
    }

    fn record_success(&mut self) {
        self.next_attempt_ms = 0;
        self.current_backoff = INITIAL_BACKOFF;
    }
}

pub async fn run(
    state: AppState,
    heartbeat: Heartbeat,
    mut events_rx: mpsc::UnboundedReceiver<RealTimeEvent>,
    mut sealed_rx: mpsc::UnboundedReceiver<zmon_models::TelemetryBatch>,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    shutdown: ShutdownSignal,
) {
    let mut persistence_tick = interval(PERSISTENCE_TICK_INTERVAL);
    let mut threshold_tick = interval(THRESHOLD_POLL_INTERVAL);
    let mut retention_tick = interval(RETENTION_SWEEP_INTERVAL);
    let mut watchdog_tick = interval(WATCHDOG_CHECK_INTERVAL);
    let mut backoff = PersistenceBackoff::default();

    loop {
        tokio::select! {
            Some(event) = events_rx.recv() => handle_real_time_event(&state, event).await,
            Some(batch) = sealed_rx.recv() => handle_sealed_batch(&state, batch).await,
            Some(event) = transport_rx.recv() => handle_transport_event(&state, event).await,
            _ = persistence_tick.tick() => {
                heartbeat.publish(now_wall_ms());
                drain_vitals(&state, &mut backoff).await;
            }
            _ = threshold_tick.tick() => {
                if early_drain_due(&state) {
                    drain_vitals(&state, &mut backoff).await;
                }
            }
            _ = retention_tick.tick() => run_retention_sweep(&state).await,
            _ = watchdog_tick.tick() => check_watchdog(&state).await,
            _ = shutdown.wait() => {
                // Final persistence drain: keep chunking
                // until the cache is empty or the store starts rejecting
                // writes, ignoring backoff since this is a one-shot drain
                // on the way out rather than an ongoing retry loop.
                loop {
                    let chunk = state.vitals_cache.unpersisted(PERSISTENCE_CHUNK_SIZE);
                    if chunk.is_empty() {
                        break;
                    }
                    match persist_vitals_chunk(&state, &chunk).await {
                        Ok(max_ms) => state.vitals_cache.mark_persisted(max_ms),
                        Err(e) => {
                            error!(error = %e, "final persistence drain failed, stopping");
                            break;
                        }
                    }
                }
                break;
            }
            else => break,
        }
    }
}

fn early_drain_due(state: &AppState) -> bool {
    state.vitals_cache.unpersisted_count() >= UNPERSISTED_RECORD_THRESHOLD
        || state.vitals_cache.utilization() >= CACHE_UTILIZATION_THRESHOLD
}

async fn check_watchdog(state: &AppState) {
    let transitions = state.watchdog.lock().expect("watchdog registry mutex poisoned").check(now_wall_ms());
    for transition in transitions {
        let details = serde_json::json!({ "transition": format!("{transition:?}") });
        if let Err(e) = state
            .journal
            .append(
                ActionKind::SystemEvent("CONTEXT_STALL".into()),
                "context",
                &state.device.device_id,
                details,
                ActionOutcome::Success,
                &state.device.device_id,
                Actor::default(),
            )
            .await
        {
            error!(error = %e, "failed to journal watchdog transition");
        }
    }
}

async fn handle_real_time_event(state: &AppState, event: RealTimeEvent) {
    match event {
        RealTimeEvent::Vital { record, batch_id } => {
            let id = uuid::Uuid::new_v4().to_string();
            if let Err(e) = state.vitals_repo.insert(&id, batch_id.as_deref(), &record).await {
                error!(error = %e, "failed to persist vital record");
            }
        }
        RealTimeEvent::Alarm(alarm) => {
            if let Err(e) = state.alarms_repo.upsert(&alarm).await {
                error!(error = %e, alarm_id = %alarm.id, "failed to persist alarm event");
            }
            let action_kind = match alarm.status {
                AlarmStatus::Acknowledged => ActionKind::AcknowledgeAlarm,
                AlarmStatus::Silenced => ActionKind::SilenceAlarm,
                _ => ActionKind::SystemEvent("ALARM_TRANSITION".into()),
            };
            let details = serde_json::json!({
                "kind": alarm.kind.as_str(),
                "priority": format!("{:?}", alarm.priority),
                "status": format!("{:?}", alarm.status),
                "triggering_value": alarm.triggering_value,
            });
            if let Err(e) = state
                .journal
                .append(action_kind, "alarm", &alarm.id, details, ActionOutcome::Success, &state.device.device_id, Actor::default())
                .await
            {
                error!(error = %e, "failed to journal alarm transition");
            }
        }
        RealTimeEvent::PatientAdmitted(mrn) => {
            let details = serde_json::json!({ "patient_mrn": mrn });
            if let Err(e) = state
                .journal
                .append(ActionKind::AdmitPatient, "patient", &mrn, details, ActionOutcome::Success, &state.device.device_id, Actor::default())
                .await
            {
                error!(error = %e, "failed to journal patient admission");
            }
        }
        RealTimeEvent::PatientDischarged(mrn) => {
            let details = serde_json::json!({ "patient_mrn": mrn });
            if let Err(e) = state
                .journal
                .append(ActionKind::DischargePatient, "patient", &mrn, details, ActionOutcome::Success, &state.device.device_id, Actor::default())
                .await
            {
                error!(error = %e, "failed to journal patient discharge");
            }
        }
        RealTimeEvent::SensorFault { kind, detail } => {
            let details = serde_json::json!({ "kind": kind, "detail": detail });
            if let Err(e) = state
                .journal
                .append(
                    ActionKind::SystemEvent("SENSOR_FAULT".into()),
                    "sensor",
                    &state.device.device_id,
                    details,
                    ActionOutcome::Failure,
                    &state.device.device_id,
                    Actor::default(),
                )
                .await
            {
                error!(error = %e, "failed to journal sensor fault");
            }
        }
    }
}

async fn handle_sealed_batch(state: &AppState, batch: zmon_models::TelemetryBatch) {
    if let Err(e) = state.telemetry_repo.insert(&batch).await {
        error!(error = %e, batch_id = %batch.id, "failed to persist telemetry batch");
    }
}

async fn handle_transport_event(state: &AppState, event: TransportEvent) {
    match event {
        TransportEvent::Acknowledged { batch_id } => {
            if let Err(e) = state.telemetry_repo.update_status(&batch_id, TelemetryStatus::Acknowledged, 0).await {
                error!(error = %e, batch_id, "failed to record batch acknowledgement");
            }
            if let Err(e) = state.vitals_repo.mark_persisted(&batch_id).await {
                error!(error = %e, batch_id, "failed to mark vitals persisted after ack");
            }
        }
        TransportEvent::Failed { batch_id } => {
            if let Err(e) = state.telemetry_repo.update_status(&batch_id, TelemetryStatus::Failed, 0).await {
                error!(error = %e, batch_id, "failed to record batch failure");
            }
        }
    }
}

/// Drains unpersisted cache entries in chunks, honoring
/// any backoff from a prior store failure and stopping to back off again
/// the moment a chunk write fails, rather than pressing on into further
/// chunks against a store that just rejected one.
async fn drain_vitals(state: &AppState, backoff: &mut PersistenceBackoff) {
    let now_ms = now_wall_ms();
    if backoff.is_waiting(now_ms) {
        return;
    }

    loop {
        let chunk = state.vitals_cache.unpersisted(PERSISTENCE_CHUNK_SIZE);
        if chunk.is_empty() {
            backoff.record_success();
            return;
        }

        match persist_vitals_chunk(state, &chunk).await {
            Ok(max_ms) => {
                state.vitals_cache.mark_persisted(max_ms);
                if chunk.len() < PERSISTENCE_CHUNK_SIZE {
                    backoff.record_success();
                    return;
                }
                // Full chunk drained; more may remain, loop for another.
            }
            Err(e) => {
                error!(error = %e, "persistence chunk write failed, backing off");
                backoff.record_failure(now_ms);
                return;
            }
        }
    }
}

/// Persists one chunk of vital records, returning the chunk's maximum
/// timestamp on success so the caller can advance the cache's
/// persisted-up-to watermark in one step.
async fn persist_vitals_chunk(state: &AppState, chunk: &[zmon_models::VitalRecord]) -> Result<u64, zmon_store::StoreError> {
    let mut max_ms = 0u64;
    for record in chunk {
        let id = uuid::Uuid::new_v4().to_string();
        state.vitals_repo.insert(&id, None, record).await?;
        max_ms = max_ms.max(record.wall_time_ms);
    }
    Ok(max_ms)
}

/// Deletes rows older than each table's retention window,
/// in bounded batches so a single sweep never holds the connection for
/// long.
async fn run_retention_sweep(state: &AppState) {
    let now_ms = now_wall_ms() as i64;
    let sweeps: [(&str, &str, u32, u32); 4] = [
        ("vitals", "timestamp_ms", state.settings.retention_vitals_days, RetentionPolicy::vitals().batch_size),
        ("alarms", "start_wall_time_ms", state.settings.retention_alarms_days, RetentionPolicy::alarms().batch_size),
        (
            "telemetry_metrics",
            "created_wall_time_ms",
            state.settings.retention_telemetry_days,
            RetentionPolicy::telemetry_metrics().batch_size,
        ),
        (
            "action_log",
            "timestamp_ms",
            state.settings.retention_action_log_days,
            RetentionPolicy::action_journal().batch_size,
        ),
    ];

    for (table, column, window_days, batch_size) in sweeps {
        let cutoff_ms = now_ms - i64::from(window_days) * 86_400_000;
        match sweep_table(state, table, column, cutoff_ms, batch_size).await {
            Ok(deleted) if deleted > 0 => info!(table, deleted, "retention sweep deleted rows"),
            Ok(_) => {}
            Err(e) => error!(error = %e, table, "retention sweep failed"),
        }
    }
}

async fn sweep_table(
    state: &AppState,
    table: &str,
    column: &str,
    cutoff_ms: i64,
    batch_size: u32,
) -> Result<u64, zmon_store::StoreError> {
    let conn = state.store.connection()?;
    // Oldest-first, bounded batch: for `action_log` this also keeps the
    // hash chain intact, since it only ever trims a contiguous prefix.
    let sql = format!(
        "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table} WHERE {column} < ?1 ORDER BY {column} ASC LIMIT ?2)"
    );
    let rows = conn.execute(&sql, params![cutoff_ms, batch_size]).await?;
    Ok(rows)
}
