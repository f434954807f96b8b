//! Real-time context: sensor ingress, vitals/waveform
//! caches, alarm engine, telemetry batcher. Runs its own tight poll loop
//! with no `.await` on I/O other than the batcher's in-memory queue push.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{error, warn};

use zmon_models::{AlarmEvent, TelemetryBatch, VitalRecord};
use zmon_sensor_ring::{attach, RingEvent, RingReader, SensorFaultKind, StallWatchdog};
use zmon_watchdog::Heartbeat;

use crate::shutdown::ShutdownSignal;
use crate::state::AppState;

/// Durable-side effects the real-time context hands off to the database
/// context, which owns all blocking I/O — the real-time context itself
/// never blocks on a write.
#[derive(Debug)]
pub enum RealTimeEvent {
    Vital { record: VitalRecord, batch_id: Option<String> },
    Alarm(AlarmEvent),
    SensorFault { kind: &'static str, detail: String },
    PatientAdmitted(String),
    PatientDischarged(String),
}

/// Notifications from the admission collaborator: `PatientAdmitted(mrn)` /
/// `PatientDischarged(mrn)`.
#[derive(Debug)]
pub enum AdmissionEvent {
    Admit(String),
    Discharge(String),
}

fn now_wall_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn now_monotonic_ns() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    let start = *START.get_or_init(std::time::Instant::now);
    start.elapsed().as_nanos() as u64
}

fn fault_kind_str(kind: SensorFaultKind) -> &'static str {
    match kind {
        SensorFaultKind::Crc => "crc",
        SensorFaultKind::Stall => "stall",
        SensorFaultKind::SkippedForward => "skipped_forward",
    }
}

/// Blocks the calling OS thread; intended to run on its own
/// current-thread runtime, pinned with an elevated scheduling priority.
pub async fn run(
    state: AppState,
    socket_path: String,
    heartbeat: Heartbeat,
    events_tx: mpsc::UnboundedSender<RealTimeEvent>,
    sealed_tx: mpsc::UnboundedSender<TelemetryBatch>,
    mut admission_rx: mpsc::UnboundedReceiver<AdmissionEvent>,
    shutdown: ShutdownSignal,
) {
    let mut reader = match attach(&socket_path).and_then(RingReader::attach) {
        Ok(reader) => reader,
        Err(e) => {
            error!(error = %e, socket_path, "failed to attach to sensor ring; real-time context exiting");
            return;
        }
    };

    let mut batcher = state.new_batcher();
    let mut stall_watchdog = StallWatchdog::new();
    let mut last_escalation_check_ms = now_wall_ms();

    loop {
        if shutdown.is_set() {
            let now_ms = now_wall_ms();
            match batcher.shutdown(now_ms).await {
                Ok(Some(batch)) => {
                    let _ = sealed_tx.send(batch);
                }
                Ok(None) => {}
                Err(e) => error!(error = %e, "failed to seal final batch on shutdown"),
            }
            break;
        }

        reader.wait_for_tick();
        let now_ms = now_wall_ms();
        let now_ns = now_monotonic_ns();
        heartbeat.publish(now_ms);

        if let Some(health) = stall_watchdog.check(reader.last_heartbeat_wall_ms(), now_ms) {
            let detail = format!("{health:?}");
            warn!(detail, "sensor heartbeat health transition");
            let _ = events_tx.send(RealTimeEvent::SensorFault { kind: "sensor_stall", detail });
        }

        for event in reader.poll() {
            handle_ring_event(&state, &mut batcher, event, now_ns, now_ms, &events_tx, &sealed_tx).await;
        }

        while let Ok(admission_event) = admission_rx.try_recv() {
            handle_admission_event(&state, &mut batcher, admission_event, now_ms, &events_tx, &sealed_tx).await;
        }

        // Silence expiry and escalation ticks run on the same cadence as
        // the poll loop; both are pure in-memory state transitions.
        if now_ms.saturating_sub(last_escalation_check_ms) >= 1_000 {
            last_escalation_check_ms = now_ms;
            let transitions = {
                let mut engine = state.alarm_engine.lock().expect("alarm engine mutex poisoned");
                let mut out = engine.expire_silences(now_ms);
                out.extend(engine.check_escalations(now_ms));
                out
            };
            for alarm in transitions {
                emit_alarm(&state, &mut batcher, alarm, now_ms, &events_tx, &sealed_tx).await;
            }
        }

        if let Ok(Some(batch)) = batcher.check_age(now_ms).await {
            let _ = sealed_tx.send(batch);
        }
    }
}

async fn handle_ring_event(
    state: &AppState,
    batcher: &mut zmon_telemetry_batcher::TelemetryBatcher,
    event: RingEvent,
    now_ns: u64,
    now_ms: u64,
    events_tx: &mpsc::UnboundedSender<RealTimeEvent>,
    sealed_tx: &mpsc::UnboundedSender<TelemetryBatch>,
) {
    match event {
        RingEvent::VitalRecordReceived(mut record) => {
            record.wall_time_ms = now_ms;
            state.vitals_cache.append(record.clone());

            let alarms = if record.is_standby() {
                Vec::new()
            } else {
                let mut engine = state.alarm_engine.lock().expect("alarm engine mutex poisoned");
                engine.evaluate(&record, now_ns, now_ms)
            };

            let sealed = batcher.append_vital(record.clone(), now_ms).await.ok().flatten();
            let batch_id = sealed.as_ref().map(|b| b.id.clone());
            let _ = events_tx.send(RealTimeEvent::Vital { record, batch_id });
            if let Some(batch) = sealed {
                let _ = sealed_tx.send(batch);
            }

            for alarm in alarms {
                emit_alarm(state, batcher, alarm, now_ms, events_tx, sealed_tx).await;
            }
        }
        RingEvent::WaveformSamplesReceived(samples) => {
            for sample in samples {
                state.waveform_cache.append(sample);
            }
        }
        RingEvent::HeartbeatSeen => {}
        RingEvent::SensorFault(kind, detail) => {
            warn!(kind = fault_kind_str(kind), detail, "sensor fault");
            let _ = events_tx.send(RealTimeEvent::SensorFault { kind: fault_kind_str(kind), detail });
        }
    }
}

/// Admit/discharge forces an immediate batch seal ahead of the patient
/// identifier change before updating admission state, so
/// the outgoing batch is never mislabeled with the new patient.
async fn handle_admission_event(
    state: &AppState,
    batcher: &mut zmon_telemetry_batcher::TelemetryBatcher,
    event: AdmissionEvent,
    now_ms: u64,
    events_tx: &mpsc::UnboundedSender<RealTimeEvent>,
    sealed_tx: &mpsc::UnboundedSender<TelemetryBatch>,
) {
    match batcher.on_patient_change(now_ms).await {
        Ok(Some(batch)) => {
            let _ = sealed_tx.send(batch);
        }
        Ok(None) => {}
        Err(e) => error!(error = %e, "failed to seal batch ahead of admission change"),
    }

    match event {
        AdmissionEvent::Admit(mrn) => {
            state.admission.admit(mrn.clone());
            let _ = events_tx.send(RealTimeEvent::PatientAdmitted(mrn));
        }
        AdmissionEvent::Discharge(mrn) => {
            state.admission.discharge();
            let _ = events_tx.send(RealTimeEvent::PatientDischarged(mrn));
        }
    }
}

async fn emit_alarm(
    state: &AppState,
    batcher: &mut zmon_telemetry_batcher::TelemetryBatcher,
    alarm: AlarmEvent,
    now_ms: u64,
    events_tx: &mpsc::UnboundedSender<RealTimeEvent>,
    sealed_tx: &mpsc::UnboundedSender<TelemetryBatch>,
) {
    let _ = events_tx.send(RealTimeEvent::Alarm(alarm.clone()));
    match batcher.append_alarm(alarm, now_ms).await {
        Ok(batch) => {
            let _ = sealed_tx.send(batch);
        }
        Err(e) => error!(error = %e, "failed to seal batch on alarm event"),
    }
}
