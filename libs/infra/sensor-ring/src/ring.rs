//! Ring reader: poll loop, wrap handling, and payload decoding.

use std::os::fd::OwnedFd;
use std::time::{Duration, Instant};

use memmap2::Mmap;
use tracing::warn;
use zmon_models::{MetricKind, Quality, VitalRecord, WaveformSample};

use crate::error::SensorError;
use crate::events::{RingEvent, SensorFaultKind};
use crate::header::{RawHeader, SLOT_COUNT, SLOT_SIZE};
use crate::slot::{self, SlotType};

const POLL_INTERVAL: Duration = Duration::from_micros(50);
const SPIN_BUDGET: Duration = Duration::from_micros(20);

pub struct RingReader {
    mmap: Mmap,
    read_index: u64,
}

impl RingReader {
    /// Maps `ring_fd` read-only and validates the header: magic, version,
    /// slot size, and slot count must all match before any slot is read.
    pub fn attach(ring_fd: OwnedFd) -> Result<Self, SensorError> {
        let mmap = unsafe { Mmap::map(&ring_fd) }
            .map_err(|e| SensorError::InvalidHeader(format!("mmap failed: {e}")))?;
        let header = unsafe { RawHeader::from_ptr(mmap.as_ptr()) };
        header.validate()?;
        let read_index = header.load_write_index();
        Ok(Self { mmap, read_index })
    }

    fn header(&self) -> &RawHeader {
        unsafe { RawHeader::from_ptr(self.mmap.as_ptr()) }
    }

    /// Last heartbeat timestamp the writer published, for driving
    /// `StallWatchdog` from outside this crate.
    #[must_use]
    pub fn last_heartbeat_wall_ms(&self) -> u64 {
        self.header().load_heartbeat_wall_ms()
    }

    fn slot_bytes(&self, slot_index: u64) -> &[u8] {
        let header_size = std::mem::size_of::<RawHeader>();
        let slot_offset = header_size + (slot_index as usize % SLOT_COUNT as usize) * SLOT_SIZE as usize;
        &self.mmap[slot_offset..slot_offset + SLOT_SIZE as usize]
    }

    /// Busy-aware wait for new data: spins briefly, then yields, up to the
    /// 50 µs poll cadence.
    pub fn wait_for_tick(&self) {
        let started = Instant::now();
        while started.elapsed() < SPIN_BUDGET {
            std::hint::spin_loop();
        }
        let remaining = POLL_INTERVAL.saturating_sub(started.elapsed());
        if !remaining.is_zero() {
            std::thread::yield_now();
        }
    }

    /// Drains all slots published since the last call, in order, returning
    /// one event per slot plus any faults encountered along the way.
    pub fn poll(&mut self) -> Vec<RingEvent> {
        let header = self.header();
        let writer_index = header.load_write_index();
        let mut events = Vec::new();

        if writer_index.saturating_sub(self.read_index) > u64::from(SLOT_COUNT) {
            let skipped = writer_index - self.read_index - u64::from(SLOT_COUNT);
            self.read_index = writer_index - u64::from(SLOT_COUNT) + 1;
            warn!(skipped, "sensor ring reader fell behind, skipped forward");
            events.push(RingEvent::SensorFault(
                SensorFaultKind::SkippedForward,
                format!("skipped {skipped} slots"),
            ));
        }

        while self.read_index < writer_index {
            let raw = self.slot_bytes(self.read_index);
            match slot::decode(raw, self.read_index as u32) {
                Ok(decoded) => match decoded.slot_type {
                    SlotType::Heartbeat => events.push(RingEvent::HeartbeatSeen),
                    SlotType::Vitals => match decode_vitals_payload(decoded.payload, decoded.timestamp_ns) {
                        Some(record) => events.push(RingEvent::VitalRecordReceived(record)),
                        None => events.push(RingEvent::SensorFault(
                            SensorFaultKind::Crc,
                            "malformed vitals payload".into(),
                        )),
                    },
                    SlotType::WaveformBatch => {
                        events.push(RingEvent::WaveformSamplesReceived(decode_waveform_payload(
                            decoded.payload,
                            decoded.timestamp_ns,
                        )))
                    }
                },
                Err(SensorError::Crc { sequence }) => {
                    events.push(RingEvent::SensorFault(SensorFaultKind::Crc, format!("sequence {sequence}")));
                }
                Err(other) => {
                    events.push(RingEvent::SensorFault(SensorFaultKind::Crc, other.to_string()));
                }
            }
            self.read_index += 1;
        }

        events
    }
}

/// Fixed layout: patient_id_len u8, patient_id bytes, metric_code u8,
/// value f64, quality u8, device_id_len u8, device_id bytes. This is an
/// internal wire choice (the external contract only fixes slot framing,
/// not payload contents) kept simple and fixed-width for a real-time
/// decode path with no allocation beyond the two owned strings.
fn decode_vitals_payload(payload: &[u8], timestamp_ns: u64) -> Option<VitalRecord> {
    let mut offset = 0usize;
    let patient_len = *payload.get(offset)? as usize;
    offset += 1;
    let patient_id = String::from_utf8(payload.get(offset..offset + patient_len)?.to_vec()).ok()?;
    offset += patient_len;

    let metric_code = *payload.get(offset)?;
    offset += 1;
    let value = f64::from_le_bytes(payload.get(offset..offset + 8)?.try_into().ok()?);
    offset += 8;
    let quality_code = *payload.get(offset)?;
    offset += 1;
    let device_len = *payload.get(offset)? as usize;
    offset += 1;
    let device_id = String::from_utf8(payload.get(offset..offset + device_len)?.to_vec()).ok()?;

    Some(VitalRecord {
        monotonic_ns: timestamp_ns,
        wall_time_ms: 0,
        patient_id,
        metric: decode_metric(metric_code),
        value,
        unit: String::new(),
        quality: decode_quality(quality_code),
        sensor_origin: String::new(),
        device_id,
    })
}

fn decode_metric(code: u8) -> MetricKind {
    match code {
        1 => MetricKind::HeartRate,
        2 => MetricKind::OxygenSaturation,
        3 => MetricKind::RespirationRate,
        4 => MetricKind::PerfusionIndex,
        _ => MetricKind::Other(format!("RAW_{code}")),
    }
}

fn decode_quality(code: u8) -> Quality {
    match code {
        0 => Quality::Good,
        1 => Quality::Fair,
        2 => Quality::Poor,
        _ => Quality::Invalid,
    }
}

/// count u16, then `count` records of channel u8 + value f32 LE +
/// sample_rate_hz u32 LE.
fn decode_waveform_payload(payload: &[u8], timestamp_ns: u64) -> Vec<WaveformSample> {
    let mut out = Vec::new();
    if payload.len() < 2 {
        return out;
    }
    let count = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    let mut offset = 2usize;
    for _ in 0..count {
        if offset + 9 > payload.len() {
            break;
        }
        let channel = payload[offset];
        let value = f32::from_le_bytes(payload[offset + 1..offset + 5].try_into().unwrap());
        let sample_rate_hz = u32::from_le_bytes(payload[offset + 5..offset + 9].try_into().unwrap());
        out.push(WaveformSample { monotonic_ns: timestamp_ns, channel, value, sample_rate_hz });
        offset += 9;
    }
    out
}
