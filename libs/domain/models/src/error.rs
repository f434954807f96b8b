//! Shared error taxonomy and degraded-status ordering.

use serde::{Deserialize, Serialize};

/// Non-exhaustive shared error taxonomy. Every crate-local error
/// type exposes a `kind() -> ErrorKind` so the orchestrator can dispatch
/// propagation policy without downcasting concrete error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Retryable locally by the originating component with bounded backoff.
    Transient,
    /// Server refusal or invalid response; batch marked failed after budget.
    PersistentExternal,
    /// Disk, key store, or database-open failure; may trigger degraded mode.
    InfrastructureFailure,
    /// CRC, audit-chain, or signature-verify failure; never silenced.
    IntegrityViolation,
    /// Silence-duration exceeded, threshold out of physiological range.
    PolicyViolation,
    /// Queue overflow, disk full, eviction of an unpersisted record.
    ResourceExhaustion,
}

/// Single worst-condition status surfaced to the UI.
/// `Ord` encodes the stated precedence: `Ok` is least severe,
/// `CriticalIntegrity` is most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DegradedStatus {
    Ok,
    DegradedNetwork,
    DegradedPersistence,
    DegradedSensor,
    CriticalIntegrity,
}

impl Default for DegradedStatus {
    fn default() -> Self {
        DegradedStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_status_wins_under_max() {
        let worst = [
            DegradedStatus::Ok,
            DegradedStatus::DegradedNetwork,
            DegradedStatus::CriticalIntegrity,
            DegradedStatus::DegradedSensor,
        ]
        .into_iter()
        .max()
        .unwrap();
        assert_eq!(worst, DegradedStatus::CriticalIntegrity);
    }
}
