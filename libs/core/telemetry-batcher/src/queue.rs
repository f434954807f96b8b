//! Bounded outbound queue, multi-producer/single-consumer, with
//! overflow-drops-oldest-pending policy.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use zmon_models::{TelemetryBatch, TelemetryStatus};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

pub struct OutboundQueue {
    inner: Mutex<VecDeque<TelemetryBatch>>,
    capacity: usize,
    notify: Notify,
}

impl OutboundQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity, notify: Notify::new() }
    }

    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }

    /// Enqueues `batch`. If the queue is at capacity, evicts and returns the
    /// oldest pending batch (marked `overflow_dropped`) to make room.
    pub async fn push(&self, batch: TelemetryBatch) -> Option<TelemetryBatch> {
        let mut guard = self.inner.lock().await;
        let dropped = if guard.len() >= self.capacity {
            guard.pop_front().map(|mut b| {
                b.status = TelemetryStatus::OverflowDropped;
                b
            })
        } else {
            None
        };
        guard.push_back(batch);
        drop(guard);
        self.notify.notify_one();
        dropped
    }

    /// Blocks until a batch is available, then removes and returns it.
    pub async fn pop(&self) -> TelemetryBatch {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if let Some(batch) = guard.pop_front() {
                    return batch;
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmon_models::TelemetryStatus;

    fn batch(id: &str) -> TelemetryBatch {
        TelemetryBatch {
            id: id.to_string(),
            device_id: "dev-1".into(),
            device_label: "Bed 4".into(),
            patient_id: Some("p1".into()),
            oldest_wall_time_ms: 0,
            newest_wall_time_ms: 0,
            vitals: vec![],
            alarms: vec![],
            created_wall_time_ms: 0,
            signed_wall_time_ms: 0,
            nonce_b64: "nonce".into(),
            signature_b64: "sig".into(),
            retry_count: 0,
            status: TelemetryStatus::Pending,
        }
    }

    #[tokio::test]
    async fn overflow_drops_oldest_pending() {
        let queue = OutboundQueue::new(2);
        assert!(queue.push(batch("a")).await.is_none());
        assert!(queue.push(batch("b")).await.is_none());
        let dropped = queue.push(batch("c")).await.unwrap();
        assert_eq!(dropped.id, "a");
        assert_eq!(dropped.status, TelemetryStatus::OverflowDropped);
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn pop_returns_fifo_order() {
        let queue = OutboundQueue::new(4);
        queue.push(batch("a")).await;
        queue.push(batch("b")).await;
        assert_eq!(queue.pop().await.id, "a");
        assert_eq!(queue.pop().await.id, "b");
    }
}
