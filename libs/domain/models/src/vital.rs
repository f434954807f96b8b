//! Vital record: the unit of data produced by sensor ingress and consumed
//! by the vitals cache, alarm engine, telemetry batcher, and store.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Enumerated physiological parameter. Variants beyond the named ones are
/// expected (the ring protocol allows arbitrary metric strings from the
/// sensor side); `Other` carries the wire value forward
/// rather than silently discarding an unrecognized metric. Serializes as a
/// plain string so the wire/store representation is stable regardless of
/// how many named variants this enum grows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricKind {
    HeartRate,
    OxygenSaturation,
    RespirationRate,
    PerfusionIndex,
    Other(String),
}

impl MetricKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            MetricKind::HeartRate => "HEART_RATE",
            MetricKind::OxygenSaturation => "OXYGEN_SATURATION",
            MetricKind::RespirationRate => "RESPIRATION_RATE",
            MetricKind::PerfusionIndex => "PERFUSION_INDEX",
            MetricKind::Other(s) => s.as_str(),
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "HEART_RATE" => MetricKind::HeartRate,
            "OXYGEN_SATURATION" => MetricKind::OxygenSaturation,
            "RESPIRATION_RATE" => MetricKind::RespirationRate,
            "PERFUSION_INDEX" => MetricKind::PerfusionIndex,
            other => MetricKind::Other(other.to_string()),
        }
    }
}

impl Serialize for MetricKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MetricKind::parse(&raw))
    }
}

/// Quality tag attached to every vital record at the point of acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Fair,
    Poor,
    /// MUST NOT trigger clinical alarms; MAY still
    /// be displayed with a quality indicator.
    Invalid,
}

impl Quality {
    #[must_use]
    pub fn is_alarm_eligible(self) -> bool {
        !matches!(self, Quality::Invalid)
    }
}

/// Immutable, copy-cheap vital record.
///
/// Invariant: a record whose `patient_id` is non-empty must
/// refer to a patient admitted at the moment of acquisition. This crate
/// cannot enforce that on its own — the orchestrator's admission tracking
/// (current patient context) is the sole writer of `patient_id` at
/// ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalRecord {
    /// Monotonic acquisition timestamp, nanoseconds, from the sensor ring.
    pub monotonic_ns: u64,
    /// Wall-clock acquisition timestamp, Unix milliseconds.
    pub wall_time_ms: u64,
    /// Opaque patient identifier (MRN); empty string in standby.
    pub patient_id: String,
    pub metric: MetricKind,
    pub value: f64,
    pub unit: String,
    pub quality: Quality,
    pub sensor_origin: String,
    pub device_id: String,
}

impl VitalRecord {
    #[must_use]
    pub fn is_standby(&self) -> bool {
        self.patient_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_quality_is_never_alarm_eligible() {
        assert!(!Quality::Invalid.is_alarm_eligible());
        assert!(Quality::Good.is_alarm_eligible());
        assert!(Quality::Fair.is_alarm_eligible());
        assert!(Quality::Poor.is_alarm_eligible());
    }

    #[test]
    fn standby_record_has_empty_patient_id() {
        let record = VitalRecord {
            monotonic_ns: 0,
            wall_time_ms: 0,
            patient_id: String::new(),
            metric: MetricKind::HeartRate,
            value: 72.0,
            unit: "bpm".into(),
            quality: Quality::Good,
            sensor_origin: "ecg0".into(),
            device_id: "dev-1".into(),
        };
        assert!(record.is_standby());
    }
}
