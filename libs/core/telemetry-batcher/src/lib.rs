//! Batch formation, sealing, and outbound handoff for telemetry.

pub mod batcher;
pub mod error;
pub mod queue;

pub use batcher::TelemetryBatcher;
pub use error::TelemetryError;
pub use queue::{OutboundQueue, DEFAULT_QUEUE_CAPACITY};
