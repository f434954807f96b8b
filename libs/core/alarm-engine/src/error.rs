//! Alarm engine error taxonomy.

use thiserror::Error;
use zmon_models::ErrorKind;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm {0} not found")]
    NotFound(String),

    #[error("silence duration {requested_ms}ms exceeds policy maximum {max_ms}ms")]
    SilenceDurationExceeded { requested_ms: u64, max_ms: u64 },

    #[error("silence expiry must lie in the future")]
    SilenceExpiryInPast,

    #[error("threshold out of physiological range for {metric}: low {low} >= high {high}")]
    ThresholdOutOfRange { metric: String, low: f64, high: f64 },

    #[error("alarm {0} is already resolved")]
    AlreadyResolved(String),
}

impl AlarmError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AlarmError::NotFound(_) | AlarmError::AlreadyResolved(_) => ErrorKind::Transient,
            AlarmError::SilenceDurationExceeded { .. }
            | AlarmError::SilenceExpiryInPast
            | AlarmError::ThresholdOutOfRange { .. } => ErrorKind::PolicyViolation,
        }
    }
}
