//! Vitals Cache: bounded double-ended ordered sequence of vital records.

use std::collections::VecDeque;
use std::sync::RwLock;

use zmon_models::VitalRecord;

use crate::DEFAULT_VITALS_CAPACITY;

/// Emitted by `append` when eviction drops a record that had not yet been
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VitalsCacheEvent {
    pub unpersisted_evicted: bool,
}

struct Inner {
    records: VecDeque<VitalRecord>,
    capacity: usize,
    /// Watermark: every record with `wall_time_ms <= persisted_up_to_ms`
    /// has been durably written by the persistence scheduler.
    persisted_up_to_ms: u64,
}

/// Single-writer/multi-reader vitals cache. The writer is the real-time
/// context; readers (persistence scheduler, alarm engine) never contend
/// with the writer because they execute on the writer's own thread or
/// take only short-lived read locks for out-of-band snapshots.
pub struct VitalsCache {
    inner: RwLock<Inner>,
}

impl VitalsCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: VecDeque::with_capacity(capacity.min(1 << 16)),
                capacity,
                persisted_up_to_ms: 0,
            }),
        }
    }

    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_VITALS_CAPACITY)
    }

    /// O(1) amortized. Evicts the oldest record if the cache is at capacity.
    pub fn append(&self, record: VitalRecord) -> VitalsCacheEvent {
        let mut inner = self.inner.write().expect("vitals cache lock poisoned");
        let mut unpersisted_evicted = false;
        if inner.records.len() >= inner.capacity {
            if let Some(oldest) = inner.records.pop_front() {
                if oldest.wall_time_ms > inner.persisted_up_to_ms {
                    unpersisted_evicted = true;
                }
            }
        }
        inner.records.push_back(record);
        VitalsCacheEvent { unpersisted_evicted }
    }

    /// Read-only copy of every record with timestamp in `[from, to]`.
    #[must_use]
    pub fn range(&self, from_ms: u64, to_ms: u64) -> Vec<VitalRecord> {
        let inner = self.inner.read().expect("vitals cache lock poisoned");
        inner
            .records
            .iter()
            .filter(|r| r.wall_time_ms >= from_ms && r.wall_time_ms <= to_ms)
            .cloned()
            .collect()
    }

    /// Unpersisted records, oldest first, bounded by `max`.
    #[must_use]
    pub fn unpersisted(&self, max: usize) -> Vec<VitalRecord> {
        let inner = self.inner.read().expect("vitals cache lock poisoned");
        inner
            .records
            .iter()
            .filter(|r| r.wall_time_ms > inner.persisted_up_to_ms)
            .take(max)
            .cloned()
            .collect()
    }

    pub fn mark_persisted(&self, up_to_timestamp_ms: u64) {
        let mut inner = self.inner.write().expect("vitals cache lock poisoned");
        if up_to_timestamp_ms > inner.persisted_up_to_ms {
            inner.persisted_up_to_ms = up_to_timestamp_ms;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("vitals cache lock poisoned").records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fraction of capacity currently occupied, used by the persistence
    /// scheduler's "cache ≥ 80% utilization" trigger.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        let inner = self.inner.read().expect("vitals cache lock poisoned");
        inner.records.len() as f64 / inner.capacity as f64
    }

    #[must_use]
    pub fn unpersisted_count(&self) -> usize {
        let inner = self.inner.read().expect("vitals cache lock poisoned");
        inner.records.iter().filter(|r| r.wall_time_ms > inner.persisted_up_to_ms).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmon_models::{MetricKind, Quality, VitalRecord};

    fn record(ms: u64) -> VitalRecord {
        VitalRecord {
            monotonic_ns: ms * 1_000_000,
            wall_time_ms: ms,
            patient_id: "p1".into(),
            metric: MetricKind::HeartRate,
            value: 80.0,
            unit: "bpm".into(),
            quality: Quality::Good,
            sensor_origin: "ecg0".into(),
            device_id: "dev-1".into(),
        }
    }

    #[test]
    fn eviction_reports_unpersisted_loss() {
        let cache = VitalsCache::new(2);
        cache.append(record(1));
        cache.append(record(2));
        // Cache full; record(1) still unpersisted, so evicting it on the
        // next append must report the loss.
        let event = cache.append(record(3));
        assert!(event.unpersisted_evicted);
    }

    #[test]
    fn eviction_of_persisted_record_is_silent() {
        let cache = VitalsCache::new(2);
        cache.append(record(1));
        cache.append(record(2));
        cache.mark_persisted(1);
        let event = cache.append(record(3));
        assert!(!event.unpersisted_evicted);
    }

    #[test]
    fn oldest_element_timestamp_is_minimum() {
        // Insertion order tracks arrival order, which in the real system is
        // monotonic wall-clock time; the FIFO head is therefore always the
        // minimum-timestamp element for any in-order arrival sequence.
        let cache = VitalsCache::new(5);
        for ms in [1, 5, 10, 15, 20] {
            cache.append(record(ms));
        }
        let all = cache.range(0, u64::MAX);
        let oldest = all.first().unwrap().wall_time_ms;
        assert!(all.iter().all(|r| r.wall_time_ms >= oldest));
    }

    #[test]
    fn unpersisted_drains_after_mark_persisted() {
        let cache = VitalsCache::new(10);
        for ms in 1..=5 {
            cache.append(record(ms));
        }
        assert_eq!(cache.unpersisted(100).len(), 5);
        cache.mark_persisted(3);
        assert_eq!(cache.unpersisted(100).len(), 2);
    }

    proptest::proptest! {
        #[test]
        fn capacity_bound_never_exceeded(timestamps in proptest::collection::vec(0u64..10_000, 0..500)) {
            let cache = VitalsCache::new(100);
            for ms in timestamps {
                cache.append(record(ms));
            }
            proptest::prop_assert!(cache.len() <= 100);
        }
    }
}
