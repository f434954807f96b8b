//! Threshold resolution, onset/hysteresis evaluation, the alarm state
//! machine, and escalation.

pub mod engine;
pub mod error;
pub mod onset;
pub mod threshold;

pub use engine::AlarmEngine;
pub use error::AlarmError;
pub use onset::{Direction, OnsetKey, OnsetTracker};
pub use threshold::ThresholdResolver;
