//! Outbound wire envelope:
//! `BatchContainer{schema_version, message_type, device_id, wall_time_ms,
//! nonce (base64), signature (base64), payload}`. JSON transport mode is
//! implemented here; binary/protobuf production mode shares the same
//! envelope shape but is left to the production wire-schema build (out of
//! scope for this core).

use serde::{Deserialize, Serialize};

use zmon_models::TelemetryBatch;

use crate::error::TransportError;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Batch,
    Alarm,
    DeviceStatus,
    Heartbeat,
    Registration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireMode {
    /// `application/x-protobuf`, production default.
    Binary,
    /// `application/json`, development.
    Json,
}

impl WireMode {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            WireMode::Binary => "application/x-protobuf",
            WireMode::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchContainer {
    pub schema_version: u32,
    pub message_type: MessageType,
    pub device_id: String,
    pub wall_time_ms: u64,
    pub nonce: String,
    pub signature: String,
    pub payload: TelemetryBatch,
}

impl BatchContainer {
    #[must_use]
    pub fn from_batch(batch: &TelemetryBatch) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            message_type: MessageType::Batch,
            device_id: batch.device_id.clone(),
            wall_time_ms: batch.signed_wall_time_ms,
            nonce: batch.nonce_b64.clone(),
            signature: batch.signature_b64.clone(),
            payload: batch.clone(),
        }
    }

    pub fn encode(&self, mode: WireMode) -> Result<Vec<u8>, TransportError> {
        match mode {
            // Production wire schema (protobuf) is out of scope for this
            // core; JSON bytes are used as the binary payload placeholder
            // so the delivery loop can exercise the same code path.
            WireMode::Binary | WireMode::Json => serde_json::to_vec(self)
                .map_err(|e| TransportError::Connection(format!("encode failed: {e}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerAck {
    pub status: String,
    pub acknowledged_ids: Vec<String>,
}

impl ServerAck {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(bytes)
            .map_err(|e| TransportError::ServerRejected(format!("malformed ack: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmon_models::TelemetryStatus;

    fn sample_batch() -> TelemetryBatch {
        TelemetryBatch {
            id: "batch-1".into(),
            device_id: "dev-1".into(),
            device_label: "Bed 4".into(),
            patient_id: Some("M1".into()),
            oldest_wall_time_ms: 1_000,
            newest_wall_time_ms: 2_000,
            vitals: Vec::new(),
            alarms: Vec::new(),
            created_wall_time_ms: 2_000,
            signed_wall_time_ms: 2_001,
            nonce_b64: "deadbeef".into(),
            signature_b64: "sig".into(),
            retry_count: 0,
            status: TelemetryStatus::Pending,
        }
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let batch = sample_batch();
        let container = BatchContainer::from_batch(&batch);
        let bytes = container.encode(WireMode::Json).unwrap();
        let decoded: BatchContainer = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.device_id, "dev-1");
        assert_eq!(decoded.payload.id, "batch-1");
    }

    #[test]
    fn ack_reports_success_status() {
        let ack = ServerAck::decode(
            br#"{"status":"success","acknowledged_ids":["batch-1","batch-2"]}"#,
        )
        .unwrap();
        assert!(ack.is_success());
        assert_eq!(ack.acknowledged_ids.len(), 2);
    }
}
