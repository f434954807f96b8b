use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub window_days: u32,
    /// Local hour of day (0-23) the nightly job runs at.
    pub cleanup_hour: u8,
    pub batch_size: u32,
    pub retry_interval_secs: u64,
}

impl RetentionPolicy {
    #[must_use]
    pub fn vitals() -> Self {
        Self { window_days: 7, cleanup_hour: 3, batch_size: 10_000, retry_interval_secs: 3_600 }
    }

    #[must_use]
    pub fn alarms() -> Self {
        Self { window_days: 90, cleanup_hour: 3, batch_size: 10_000, retry_interval_secs: 3_600 }
    }

    #[must_use]
    pub fn action_journal() -> Self {
        Self { window_days: 90, cleanup_hour: 3, batch_size: 10_000, retry_interval_secs: 3_600 }
    }

    #[must_use]
    pub fn telemetry_metrics() -> Self {
        Self { window_days: 30, cleanup_hour: 3, batch_size: 10_000, retry_interval_secs: 3_600 }
    }
}
