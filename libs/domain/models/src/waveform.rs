//! Waveform sample: display-only high-rate data, never persisted as a
//! continuous stream.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveformSample {
    pub monotonic_ns: u64,
    pub channel: u8,
    pub value: f32,
    pub sample_rate_hz: u32,
}
