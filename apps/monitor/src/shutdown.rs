//! Orchestrator-wide shutdown broadcast: each context thread exits its
//! loop at the next natural suspension point rather than being torn down
//! mid-operation. A cheap `Arc<AtomicBool>` flag does the signaling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)) }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Exposes the underlying flag for crates that can't depend on
    /// `apps/monitor` directly (e.g. `zmon-transport`'s delivery loop).
    #[must_use]
    pub fn atomic(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Resolves once `trigger()` has been called elsewhere. Cancel-safe:
    /// each poll re-checks the flag rather than holding a lock across an
    /// await, so racing it in a `select!` never loses a wakeup.
    pub async fn wait(&self) {
        while !self.is_set() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
