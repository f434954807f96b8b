//! Telemetry batch: append-only while open, then sealed and immutable.

use crate::alarm::AlarmEvent;
use crate::vital::VitalRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryStatus {
    Pending,
    InFlight,
    Acknowledged,
    Failed,
    /// Evicted from the outbound queue to make room for a newer batch.
    OverflowDropped,
}

/// A telemetry batch. Construction of a *sealed* batch only happens inside
/// `zmon-telemetry-batcher`; this type is intentionally permissive (public
/// fields) because the store and transport crates both need to
/// deserialize it back from their respective representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub id: String,
    pub device_id: String,
    pub device_label: String,
    pub patient_id: Option<String>,
    pub oldest_wall_time_ms: u64,
    pub newest_wall_time_ms: u64,
    pub vitals: Vec<VitalRecord>,
    pub alarms: Vec<AlarmEvent>,
    pub created_wall_time_ms: u64,
    pub signed_wall_time_ms: u64,
    /// 128-bit nonce, base64 on the wire.
    pub nonce_b64: String,
    /// Signature over (device id ‖ creation timestamp ‖ nonce ‖ payload hash).
    pub signature_b64: String,
    pub retry_count: u32,
    pub status: TelemetryStatus,
}

impl TelemetryBatch {
    #[must_use]
    pub fn is_empty_of_clinical_data(&self) -> bool {
        self.vitals.is_empty() && self.alarms.is_empty()
    }
}
