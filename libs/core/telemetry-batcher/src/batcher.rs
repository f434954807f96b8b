//! Batch formation and sealing.

use std::sync::Arc;

use uuid::Uuid;
use zmon_crypto::{generate_nonce, hash_payload, sign_batch, KeyHandle};
use zmon_models::{AlarmEvent, DeviceIdentity, TelemetryBatch, TelemetryStatus, VitalRecord};

use crate::error::TelemetryError;
use crate::queue::OutboundQueue;

const SEAL_SIZE_THRESHOLD: usize = 100;
const SEAL_AGE_THRESHOLD_MS: u64 = 10_000;

struct OpenBatch {
    id: String,
    patient_id: Option<String>,
    vitals: Vec<VitalRecord>,
    alarms: Vec<AlarmEvent>,
    oldest_wall_time_ms: u64,
    newest_wall_time_ms: u64,
    created_wall_time_ms: u64,
}

impl OpenBatch {
    fn new(patient_id: Option<String>, now_wall_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            patient_id,
            vitals: Vec::new(),
            alarms: Vec::new(),
            oldest_wall_time_ms: now_wall_ms,
            newest_wall_time_ms: now_wall_ms,
            created_wall_time_ms: now_wall_ms,
        }
    }
}

/// Groups vital records and alarm events into small, frequently-sealed,
/// signed batches and hands them to the outbound queue.
pub struct TelemetryBatcher {
    device: DeviceIdentity,
    key: Arc<KeyHandle>,
    open: Option<OpenBatch>,
    queue: Arc<OutboundQueue>,
}

impl TelemetryBatcher {
    #[must_use]
    pub fn new(device: DeviceIdentity, key: Arc<KeyHandle>, queue: Arc<OutboundQueue>) -> Self {
        Self { device, key, open: None, queue }
    }

    /// Appends a vital record to the open batch, sealing and enqueuing it if
    /// a size or age trigger fires. Vitals recorded while no patient is
    /// admitted are never transmitted.
    pub async fn append_vital(&mut self, record: VitalRecord, now_wall_ms: u64) -> Result<Option<TelemetryBatch>, TelemetryError> {
        if record.is_standby() {
            return Ok(None);
        }
        let open = self.open.get_or_insert_with(|| OpenBatch::new(Some(record.patient_id.clone()), now_wall_ms));
        open.newest_wall_time_ms = now_wall_ms;
        open.vitals.push(record);

        if self.should_seal_by_size_or_age(now_wall_ms) {
            return Ok(Some(self.seal(now_wall_ms).await?));
        }
        Ok(None)
    }

    /// Any alarm event appended is itself a seal trigger.
    pub async fn append_alarm(&mut self, alarm: AlarmEvent, now_wall_ms: u64) -> Result<TelemetryBatch, TelemetryError> {
        let patient_id = Some(alarm.patient_id.clone());
        let open = self.open.get_or_insert_with(|| OpenBatch::new(patient_id, now_wall_ms));
        open.newest_wall_time_ms = now_wall_ms;
        open.alarms.push(alarm);
        self.seal(now_wall_ms).await
    }

    /// Seals the open batch if it has aged past the seal threshold. Called
    /// periodically by the real-time context's tick.
    pub async fn check_age(&mut self, now_wall_ms: u64) -> Result<Option<TelemetryBatch>, TelemetryError> {
        if self.should_seal_by_size_or_age(now_wall_ms) {
            return Ok(Some(self.seal(now_wall_ms).await?));
        }
        Ok(None)
    }

    /// Seals the current batch (if any) ahead of an admit/discharge patient
    /// change.
    pub async fn on_patient_change(&mut self, now_wall_ms: u64) -> Result<Option<TelemetryBatch>, TelemetryError> {
        if self.open.is_some() {
            return Ok(Some(self.seal(now_wall_ms).await?));
        }
        Ok(None)
    }

    /// Final synchronous seal on shutdown.
    pub async fn shutdown(&mut self, now_wall_ms: u64) -> Result<Option<TelemetryBatch>, TelemetryError> {
        self.on_patient_change(now_wall_ms).await
    }

    fn should_seal_by_size_or_age(&self, now_wall_ms: u64) -> bool {
        match &self.open {
            Some(open) => {
                open.vitals.len() >= SEAL_SIZE_THRESHOLD
                    || now_wall_ms.saturating_sub(open.created_wall_time_ms) >= SEAL_AGE_THRESHOLD_MS
            }
            None => false,
        }
    }

    async fn seal(&mut self, now_wall_ms: u64) -> Result<TelemetryBatch, TelemetryError> {
        let open = self.open.take().expect("seal called with no open batch");
        let payload = serde_json::json!({ "vitals": open.vitals, "alarms": open.alarms });
        let payload_bytes = serde_json::to_vec(&payload)?;
        let payload_hash = hash_payload(&payload_bytes);
        let nonce_b64 = generate_nonce();
        let signature_b64 =
            sign_batch(&self.key, &self.device.device_id, now_wall_ms, &nonce_b64, &payload_hash);

        let batch = TelemetryBatch {
            id: open.id,
            device_id: self.device.device_id.clone(),
            device_label: self.device.device_label.clone(),
            patient_id: open.patient_id,
            oldest_wall_time_ms: open.oldest_wall_time_ms,
            newest_wall_time_ms: open.newest_wall_time_ms,
            vitals: open.vitals,
            alarms: open.alarms,
            created_wall_time_ms: open.created_wall_time_ms,
            signed_wall_time_ms: now_wall_ms,
            nonce_b64,
            signature_b64,
            retry_count: 0,
            status: TelemetryStatus::Pending,
        };

        if let Some(dropped) = self.queue.push(batch.clone()).await {
            tracing::warn!(batch_id = %dropped.id, "telemetry queue full; dropped oldest pending batch");
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmon_models::{MeasurementUnit, MetricKind, Quality};

    fn device() -> DeviceIdentity {
        DeviceIdentity {
            device_id: "dev-1".into(),
            device_label: "Bed 4".into(),
            measurement_unit: MeasurementUnit::Metric,
        }
    }

    fn test_key() -> KeyHandle {
        // Freshly generated P-256 key, PKCS8 PEM, for test use only.
        use p256::ecdsa::SigningKey;
        use p256::pkcs8::EncodePrivateKey;
        let signing_key = SigningKey::from_slice(&[7u8; 32]).expect("valid scalar");
        let pem = signing_key.to_pkcs8_pem(Default::default()).unwrap();
        KeyHandle::from_pkcs8_pem(&pem).unwrap()
    }

    fn vital(patient: &str, wall_ms: u64) -> VitalRecord {
        VitalRecord {
            monotonic_ns: wall_ms * 1_000_000,
            wall_time_ms: wall_ms,
            patient_id: patient.to_string(),
            metric: MetricKind::HeartRate,
            value: 80.0,
            unit: "bpm".into(),
            quality: Quality::Good,
            sensor_origin: "ecg0".into(),
            device_id: "dev-1".into(),
        }
    }

    #[tokio::test]
    async fn standby_vitals_are_never_batched() {
        let queue = Arc::new(OutboundQueue::new(4));
        let mut batcher = TelemetryBatcher::new(device(), Arc::new(test_key()), queue.clone());
        let sealed = batcher.append_vital(vital("", 0), 0).await.unwrap();
        assert!(sealed.is_none());
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn seals_at_size_threshold() {
        let queue = Arc::new(OutboundQueue::new(4));
        let mut batcher = TelemetryBatcher::new(device(), Arc::new(test_key()), queue.clone());
        let mut sealed_batch = None;
        for i in 0..100u64 {
            sealed_batch = batcher.append_vital(vital("p1", i), i).await.unwrap();
        }
        let batch = sealed_batch.expect("100th record should seal");
        assert_eq!(batch.vitals.len(), 100);
        assert!(!batch.signature_b64.is_empty());
    }

    #[tokio::test]
    async fn seals_at_age_threshold() {
        let queue = Arc::new(OutboundQueue::new(4));
        let mut batcher = TelemetryBatcher::new(device(), Arc::new(test_key()), queue.clone());
        batcher.append_vital(vital("p1", 0), 0).await.unwrap();
        let sealed = batcher.check_age(10_000).await.unwrap();
        assert!(sealed.is_some());
    }

    #[tokio::test]
    async fn appending_alarm_always_seals() {
        let queue = Arc::new(OutboundQueue::new(4));
        let mut batcher = TelemetryBatcher::new(device(), Arc::new(test_key()), queue.clone());
        batcher.append_vital(vital("p1", 0), 0).await.unwrap();
        batcher.append_vital(vital("p1", 1_000), 1_000).await.unwrap();
        let alarm = AlarmEvent {
            id: "a1".into(),
            patient_id: "p1".into(),
            kind: zmon_models::AlarmKind::HrHigh,
            priority: zmon_models::AlarmPriority::High,
            status: zmon_models::AlarmStatus::Active,
            start_wall_time_ms: 2_000,
            triggering_value: 130.0,
            threshold_value: 120.0,
            ack_user: None,
            ack_wall_time_ms: None,
            silence_expiry_wall_time_ms: None,
            escalation_level: 0,
            context: serde_json::json!({}),
        };
        let batch = batcher.append_alarm(alarm, 2_000).await.unwrap();
        assert_eq!(batch.vitals.len(), 2);
        assert_eq!(batch.alarms.len(), 1);
    }
}
