//! End-to-end seed scenarios wiring the same crates `AppState` composes,
//! exercising them together the way the real-time/database contexts do.

use std::sync::Arc;

use zmon_alarm_engine::{AlarmEngine, ThresholdResolver};
use zmon_crypto::KeyHandle;
use zmon_journal::{Actor, Journal};
use zmon_models::{
    ActionKind, ActionOutcome, AlarmPriority, AlarmStatus, AlarmThreshold, DeviceIdentity,
    MeasurementUnit, MetricKind, Quality, TelemetryStatus, VitalRecord,
};
use zmon_sensor_ring::{SensorHealth, StallWatchdog};
use zmon_store::{ActionLogRepository, AlarmsRepository, Store, TelemetryRepository, VitalsRepository};
use zmon_telemetry_batcher::{OutboundQueue, TelemetryBatcher};

fn device() -> DeviceIdentity {
    DeviceIdentity {
        device_id: "dev-scenario".into(),
        device_label: "Bed 7".into(),
        measurement_unit: MeasurementUnit::Metric,
    }
}

fn test_key() -> KeyHandle {
    use p256::ecdsa::SigningKey;
    use p256::pkcs8::EncodePrivateKey;
    let signing_key = SigningKey::from_slice(&[9u8; 32]).expect("valid scalar");
    let pem = signing_key.to_pkcs8_pem(Default::default()).unwrap();
    KeyHandle::from_pkcs8_pem(&pem).unwrap()
}

fn vital(patient: &str, value: f64, wall_ms: u64) -> VitalRecord {
    VitalRecord {
        monotonic_ns: wall_ms * 1_000_000,
        wall_time_ms: wall_ms,
        patient_id: patient.to_string(),
        metric: MetricKind::HeartRate,
        value,
        unit: "bpm".into(),
        quality: Quality::Good,
        sensor_origin: "ecg0".into(),
        device_id: "dev-scenario".into(),
    }
}

async fn memory_store() -> Store {
    Store::connect(":memory:", &[3u8; 32]).await.expect("in-memory store connects")
}

/// S1: an alarm onsets after the hysteresis/onset-delay window, is
/// persisted, then acknowledged, and the acknowledgement is visible both
/// in the alarms table and the action journal.
#[tokio::test]
async fn s1_alarm_onset_then_acknowledge_is_persisted_and_journaled() {
    let store = memory_store().await;
    let alarms_repo = AlarmsRepository::new(store.clone());
    let journal = Journal::new(ActionLogRepository::new(store.clone()));

    let mut engine = AlarmEngine::new(ThresholdResolver::new());
    let hr_high = vital("p-1", 140.0, 0);

    // First observation only starts the onset timer (default delay 2s).
    let none_yet = engine.evaluate(&hr_high, 0, 0);
    assert!(none_yet.is_empty());

    let past_onset = vital("p-1", 140.0, 3_000);
    let raised = engine.evaluate(&past_onset, 3_000_000_000, 3_000);
    assert_eq!(raised.len(), 1);
    let alarm = raised.into_iter().next().unwrap();
    assert_eq!(alarm.status, AlarmStatus::Active);
    assert_eq!(alarm.priority, AlarmPriority::High);

    alarms_repo.upsert(&alarm).await.expect("alarm persists");
    journal
        .append(
            ActionKind::SystemEvent("ALARM_TRANSITION".into()),
            "alarm",
            &alarm.id,
            serde_json::json!({ "status": "active" }),
            ActionOutcome::Success,
            "dev-scenario",
            Actor::default(),
        )
        .await
        .expect("onset journals");

    let acked = engine.acknowledge(&alarm.id, "nurse-1", 3_500).expect("open alarm acknowledges");
    assert_eq!(acked.status, AlarmStatus::Acknowledged);
    alarms_repo.upsert(&acked).await.expect("acknowledgement persists");
    journal
        .append(
            ActionKind::AcknowledgeAlarm,
            "alarm",
            &acked.id,
            serde_json::json!({}),
            ActionOutcome::Success,
            "dev-scenario",
            Actor { user_id: Some("nurse-1".into()), ..Actor::default() },
        )
        .await
        .expect("acknowledgement journals");

    let active = alarms_repo.active_for_patient("p-1").await.expect("query succeeds");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, AlarmStatus::Acknowledged);

    journal.verify_chain().await.expect("two-entry chain verifies");
}

/// S2: attempting to silence a high-priority alarm beyond its 120 s cap
/// is rejected, and the alarm's state is unchanged.
#[tokio::test]
async fn s2_silence_beyond_policy_cap_is_rejected() {
    let mut engine = AlarmEngine::new(ThresholdResolver::new());
    let hr_high = vital("p-2", 150.0, 0);
    engine.evaluate(&hr_high, 0, 0);
    let raised = engine.evaluate(&vital("p-2", 150.0, 3_000), 3_000_000_000, 3_000);
    let alarm = raised.into_iter().next().expect("alarm raised");
    assert_eq!(alarm.priority, AlarmPriority::High);

    let err = engine.silence(&alarm.id, 121_000, 3_000).expect_err("exceeds 120s cap");
    match err {
        zmon_alarm_engine::AlarmError::SilenceDurationExceeded { requested_ms, max_ms } => {
            assert_eq!(requested_ms, 121_000);
            assert_eq!(max_ms, 120_000);
        }
        other => panic!("expected SilenceDurationExceeded, got {other:?}"),
    }

    assert_eq!(engine.get(&alarm.id).unwrap().status, AlarmStatus::Active);

    let ok = engine.silence(&alarm.id, 60_000, 3_000).expect("within cap");
    assert_eq!(ok.status, AlarmStatus::Silenced);
}

/// S3: an alarm event always forces an immediate batch seal, even with no
/// vitals queued, and the sealed batch reaches the outbound queue.
#[tokio::test]
async fn s3_alarm_event_forces_telemetry_seal() {
    let queue = Arc::new(OutboundQueue::new(8));
    let mut batcher = TelemetryBatcher::new(device(), Arc::new(test_key()), queue.clone());

    let mut engine = AlarmEngine::new(ThresholdResolver::new());
    engine.evaluate(&vital("p-3", 145.0, 0), 0, 0);
    let raised = engine.evaluate(&vital("p-3", 145.0, 3_000), 3_000_000_000, 3_000);
    let alarm = raised.into_iter().next().expect("alarm raised");

    let sealed = batcher.append_alarm(alarm.clone(), 3_000).await.expect("alarm seals immediately");
    assert_eq!(sealed.alarms.len(), 1);
    assert_eq!(sealed.alarms[0].id, alarm.id);
    assert_eq!(queue.len().await, 1);

    let store = memory_store().await;
    let telemetry_repo = TelemetryRepository::new(store);
    telemetry_repo.insert(&sealed).await.expect("sealed batch persists");
    let pending = telemetry_repo.pending().await.expect("query succeeds");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, TelemetryStatus::Pending);
}

/// S4: a sensor heartbeat stall is reported once, then recovery is
/// reported once, matching the ring's 250 ms staleness threshold.
#[tokio::test]
async fn s4_sensor_stall_then_recovery_reports_each_transition_once() {
    let mut watchdog = StallWatchdog::new();
    assert_eq!(watchdog.check(0, 100), None, "still within threshold");
    assert_eq!(watchdog.check(0, 400), Some(SensorHealth::Degraded));
    assert_eq!(watchdog.check(0, 450), None, "already reported, no repeat");
    assert_eq!(watchdog.check(1_000, 1_100), Some(SensorHealth::Ok));
    assert_eq!(watchdog.check(1_000, 1_150), None, "already reported, no repeat");
}

/// S5: tampering with a stored journal row is detected by `verify_chain`,
/// naming the altered entry rather than the one where the mismatch
/// first surfaces.
#[tokio::test]
async fn s5_audit_chain_tamper_is_detected_at_altered_entry() {
    let store = memory_store().await;
    let journal = Journal::new(ActionLogRepository::new(store.clone()));

    for i in 0..4 {
        journal
            .append(
                ActionKind::SilenceAlarm,
                "alarm",
                &format!("alarm-{i}"),
                serde_json::json!({ "n": i }),
                ActionOutcome::Success,
                "dev-scenario",
                Actor::default(),
            )
            .await
            .expect("append succeeds");
    }
    journal.verify_chain().await.expect("untampered chain verifies");

    let conn = store.connection().unwrap();
    conn.execute("UPDATE action_log SET target_id = 'tampered' WHERE id = 2", ())
        .await
        .expect("tamper succeeds");

    let err = journal.verify_chain().await.expect_err("tampered chain fails verification");
    match err {
        zmon_journal::JournalError::ChainBroken { at_entry } => assert_eq!(at_entry, 2),
        other => panic!("expected ChainBroken, got {other:?}"),
    }
}

/// S6: once the outbound queue is at capacity, enqueuing another batch
/// evicts the oldest pending one and marks it overflow-dropped rather
/// than silently discarding it.
#[tokio::test]
async fn s6_outbound_queue_overflow_drops_oldest_pending_batch() {
    let queue = Arc::new(OutboundQueue::new(2));
    let mut batcher = TelemetryBatcher::new(device(), Arc::new(test_key()), queue.clone());

    let mut sealed_ids = Vec::new();
    for i in 0..3u64 {
        let mut engine = AlarmEngine::new(ThresholdResolver::new());
        engine.evaluate(&vital("p-6", 145.0, i * 10), i * 10_000_000, i * 10);
        let raised = engine.evaluate(&vital("p-6", 145.0, i * 10 + 3_000), i * 10_000_000 + 3_000_000_000, i * 10 + 3_000);
        let alarm = raised.into_iter().next().expect("alarm raised");
        let sealed = batcher.append_alarm(alarm, i * 10 + 3_000).await.expect("seals");
        sealed_ids.push(sealed.id);
    }

    assert_eq!(queue.len().await, 2, "capacity enforced");

    let first = queue.pop().await;
    assert_eq!(first.id, sealed_ids[1], "oldest of the surviving two pops first");
    let second = queue.pop().await;
    assert_eq!(second.id, sealed_ids[2]);
}
