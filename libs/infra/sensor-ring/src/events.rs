//! Sensor ingress event stream.

use zmon_models::{VitalRecord, WaveformSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFaultKind {
    Crc,
    Stall,
    SkippedForward,
}

#[derive(Debug, Clone)]
pub enum RingEvent {
    VitalRecordReceived(VitalRecord),
    WaveformSamplesReceived(Vec<WaveformSample>),
    HeartbeatSeen,
    SensorFault(SensorFaultKind, String),
}
