use thiserror::Error;
use zmon_models::ErrorKind;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("control socket handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("ring header invalid: {0}")]
    InvalidHeader(String),

    #[error("slot CRC mismatch at sequence {sequence}")]
    Crc { sequence: u32 },

    #[error("reader fell {skipped} slots behind the writer, skipped forward")]
    SkippedForward { skipped: u64 },

    #[error("sensor heartbeat stalled for {age_ms} ms")]
    Stall { age_ms: u64 },

    #[error("unrecognized slot type {0}")]
    UnknownSlotType(u8),
}

impl SensorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SensorError::HandshakeFailed(_) | SensorError::InvalidHeader(_) => {
                ErrorKind::InfrastructureFailure
            }
            SensorError::Crc { .. } => ErrorKind::IntegrityViolation,
            SensorError::SkippedForward { .. } => ErrorKind::ResourceExhaustion,
            SensorError::Stall { .. } => ErrorKind::Transient,
            SensorError::UnknownSlotType(_) => ErrorKind::IntegrityViolation,
        }
    }
}
