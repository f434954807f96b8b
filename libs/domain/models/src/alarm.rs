//! Alarm threshold and alarm event types.

use crate::vital::MetricKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStatus {
    Active,
    Acknowledged,
    Silenced,
    Resolved,
}

impl AlarmStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, AlarmStatus::Resolved)
    }
}

/// Alarm kind. `Other` preserves unrecognized technical-alarm kinds coming
/// from sensor fault translation rather than discarding them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmKind {
    HrHigh,
    HrLow,
    Spo2Low,
    RrHigh,
    RrLow,
    Technical,
    Other(String),
}

impl AlarmKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            AlarmKind::HrHigh => "HR_HIGH",
            AlarmKind::HrLow => "HR_LOW",
            AlarmKind::Spo2Low => "SPO2_LOW",
            AlarmKind::RrHigh => "RR_HIGH",
            AlarmKind::RrLow => "RR_LOW",
            AlarmKind::Technical => "TECHNICAL",
            AlarmKind::Other(s) => s.as_str(),
        }
    }

    #[must_use]
    pub fn high_for(metric: &MetricKind) -> Self {
        match metric {
            MetricKind::HeartRate => AlarmKind::HrHigh,
            MetricKind::RespirationRate => AlarmKind::RrHigh,
            other => AlarmKind::Other(format!("{}_HIGH", other.as_str())),
        }
    }

    #[must_use]
    pub fn low_for(metric: &MetricKind) -> Self {
        match metric {
            MetricKind::HeartRate => AlarmKind::HrLow,
            MetricKind::OxygenSaturation => AlarmKind::Spo2Low,
            MetricKind::RespirationRate => AlarmKind::RrLow,
            other => AlarmKind::Other(format!("{}_LOW", other.as_str())),
        }
    }
}

/// Per-metric, per-patient threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmThreshold {
    pub metric: MetricKind,
    pub low: f64,
    pub high: f64,
    /// Absolute units, applied symmetrically.
    pub hysteresis: f64,
    pub onset_delay_ms: u64,
    pub enabled: bool,
    pub priority: AlarmPriority,
}

impl AlarmThreshold {
    #[must_use]
    pub fn default_onset_delay_ms() -> u64 {
        2_000
    }
}

/// One alarm instance's full lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub id: String,
    pub patient_id: String,
    pub kind: AlarmKind,
    pub priority: AlarmPriority,
    pub status: AlarmStatus,
    pub start_wall_time_ms: u64,
    pub triggering_value: f64,
    pub threshold_value: f64,
    pub ack_user: Option<String>,
    pub ack_wall_time_ms: Option<u64>,
    pub silence_expiry_wall_time_ms: Option<u64>,
    pub escalation_level: u32,
    /// JSON blob: recent vitals, thresholds, optional waveform snapshot ref.
    pub context: serde_json::Value,
}

impl AlarmEvent {
    /// Priority invariant: never decreases
    /// during the alarm's lifetime.
    pub fn raise_priority_to(&mut self, candidate: AlarmPriority) {
        if candidate > self.priority {
            self.priority = candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_is_low_medium_high() {
        assert!(AlarmPriority::Low < AlarmPriority::Medium);
        assert!(AlarmPriority::Medium < AlarmPriority::High);
    }

    #[test]
    fn raise_priority_never_decreases() {
        let mut event = AlarmEvent {
            id: "a1".into(),
            patient_id: "p1".into(),
            kind: AlarmKind::HrHigh,
            priority: AlarmPriority::High,
            status: AlarmStatus::Active,
            start_wall_time_ms: 0,
            triggering_value: 105.0,
            threshold_value: 100.0,
            ack_user: None,
            ack_wall_time_ms: None,
            silence_expiry_wall_time_ms: None,
            escalation_level: 0,
            context: serde_json::json!({}),
        };
        event.raise_priority_to(AlarmPriority::Low);
        assert_eq!(event.priority, AlarmPriority::High);
        event.raise_priority_to(AlarmPriority::High);
        assert_eq!(event.priority, AlarmPriority::High);
    }
}
