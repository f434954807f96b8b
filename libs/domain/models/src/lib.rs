//! Core data model shared by every Z Monitor crate.
//!
//! Types here are immutable and copy-cheap where that matters for the
//! real-time path (vital records, waveform samples); anything that must
//! be sealed or appended (telemetry batches, journal entries) exposes
//! construction only through the owning crate so invariants can't be
//! bypassed by field mutation from the outside.

pub mod alarm;
pub mod certificate;
pub mod device;
pub mod error;
pub mod journal;
pub mod retention;
pub mod telemetry;
pub mod vital;
pub mod waveform;

pub use alarm::{AlarmEvent, AlarmKind, AlarmPriority, AlarmStatus, AlarmThreshold};
pub use certificate::{CertificateRecord, CertificateStatus};
pub use device::DeviceIdentity;
pub use error::{DegradedStatus, ErrorKind};
pub use journal::{ActionJournalEntry, ActionKind, ActionOutcome, GENESIS_HASH};
pub use retention::RetentionPolicy;
pub use telemetry::{TelemetryBatch, TelemetryStatus};
pub use vital::{MetricKind, Quality, VitalRecord};
pub use waveform::WaveformSample;
