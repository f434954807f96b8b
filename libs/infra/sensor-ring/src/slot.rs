//! Per-slot decoding.

use crc32fast::Hasher;

use crate::error::SensorError;

pub const MAX_PAYLOAD: usize = 4064;

const TYPE_OFFSET: usize = 0;
const TIMESTAMP_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = 12;
const PAYLOAD_SIZE_OFFSET: usize = 16;
const PAYLOAD_OFFSET: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Vitals,
    WaveformBatch,
    Heartbeat,
}

impl SlotType {
    fn from_u8(raw: u8) -> Result<Self, SensorError> {
        match raw {
            0x01 => Ok(SlotType::Vitals),
            0x02 => Ok(SlotType::WaveformBatch),
            0x03 => Ok(SlotType::Heartbeat),
            other => Err(SensorError::UnknownSlotType(other)),
        }
    }
}

pub struct DecodedSlot<'a> {
    pub slot_type: SlotType,
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub payload: &'a [u8],
}

/// Decodes and CRC-validates one slot's raw bytes. `raw` must be exactly
/// the slot region; CRC32 covers
/// type ‖ timestamp ‖ sequence ‖ payload-size ‖ payload, matching the
/// writer's published checksum field that immediately follows the payload.
pub fn decode(raw: &[u8], sequence_hint: u32) -> Result<DecodedSlot<'_>, SensorError> {
    let slot_type = SlotType::from_u8(raw[TYPE_OFFSET])?;
    let timestamp_ns = u64::from_le_bytes(raw[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].try_into().unwrap());
    let sequence = u32::from_le_bytes(raw[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4].try_into().unwrap());
    let payload_size = u32::from_le_bytes(
        raw[PAYLOAD_SIZE_OFFSET..PAYLOAD_SIZE_OFFSET + 4].try_into().unwrap(),
    ) as usize;

    if payload_size > MAX_PAYLOAD || PAYLOAD_OFFSET + payload_size + 4 > raw.len() {
        return Err(SensorError::Crc { sequence: sequence_hint });
    }

    let payload = &raw[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload_size];
    let crc_offset = PAYLOAD_OFFSET + payload_size;
    let stored_crc = u32::from_le_bytes(raw[crc_offset..crc_offset + 4].try_into().unwrap());

    let mut hasher = Hasher::new();
    hasher.update(&raw[TYPE_OFFSET..PAYLOAD_OFFSET]);
    hasher.update(payload);
    if hasher.finalize() != stored_crc {
        return Err(SensorError::Crc { sequence });
    }

    Ok(DecodedSlot { slot_type, timestamp_ns, sequence, payload })
}
