//! Tiered in-memory caches owned exclusively by the real-time context
//!. Writers are the real-time context; readers
//! (persistence scheduler, alarm engine) run on the same thread as the
//! writer, so the `RwLock` here only protects against true cross-thread
//! readers such as a diagnostics snapshot taken from another context.

pub mod vitals;
pub mod waveform;

pub use vitals::{VitalsCache, VitalsCacheEvent};
pub use waveform::WaveformCache;

/// Default capacity: ~3 days at 10 Hz aggregate.
pub const DEFAULT_VITALS_CAPACITY: usize = 2_600_000;

/// Default capacity: ~30 s at 250 Hz.
pub const DEFAULT_WAVEFORM_CAPACITY: usize = 7_500;
