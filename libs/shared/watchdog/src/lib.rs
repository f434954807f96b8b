//! Per-context heartbeat registry and stall detection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

pub const CHECK_CADENCE_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    RealTime,
    Database,
    Network,
}

impl Context {
    #[must_use]
    pub fn staleness_threshold_ms(self) -> u64 {
        match self {
            Context::RealTime => 100,
            Context::Database => 500,
            Context::Network => 1_000,
        }
    }
}

/// Per-context restart capability. Real-time defaults to
/// disabled so a hard fault there surfaces instead of being masked by a
/// restart loop.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl RestartPolicy {
    #[must_use]
    pub fn default_for(context: Context) -> Self {
        match context {
            Context::RealTime => Self { enabled: false, max_attempts: 0, cooldown: Duration::from_secs(0) },
            Context::Database | Context::Network => {
                Self { enabled: true, max_attempts: 3, cooldown: Duration::from_secs(30) }
            }
        }
    }
}

/// A single context's heartbeat counter. Clone is cheap (shared `Arc`);
/// the real-time context writes it every loop iteration without locking.
#[derive(Clone)]
pub struct Heartbeat {
    wall_ms: Arc<AtomicU64>,
}

impl Heartbeat {
    #[must_use]
    pub fn new() -> Self {
        Self { wall_ms: Arc::new(AtomicU64::new(0)) }
    }

    pub fn publish(&self, now_wall_ms: u64) {
        self.wall_ms.store(now_wall_ms, Ordering::Release);
    }

    #[must_use]
    pub fn last_wall_ms(&self) -> u64 {
        self.wall_ms.load(Ordering::Acquire)
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallEvent {
    Stalled { context: Context, age_ms: u64 },
    Recovered { context: Context },
}

pub struct WatchdogRegistry {
    heartbeats: HashMap<Context, Heartbeat>,
    stalled: HashMap<Context, bool>,
}

impl WatchdogRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut heartbeats = HashMap::new();
        let mut stalled = HashMap::new();
        for context in [Context::RealTime, Context::Database, Context::Network] {
            heartbeats.insert(context, Heartbeat::new());
            stalled.insert(context, false);
        }
        Self { heartbeats, stalled }
    }

    #[must_use]
    pub fn handle(&self, context: Context) -> Heartbeat {
        self.heartbeats[&context].clone()
    }

    /// Checks every context's staleness against its threshold and returns
    /// the transitions since the last check.
    pub fn check(&mut self, now_wall_ms: u64) -> Vec<StallEvent> {
        let mut events = Vec::new();
        for context in [Context::RealTime, Context::Database, Context::Network] {
            let last = self.heartbeats[&context].last_wall_ms();
            let age_ms = now_wall_ms.saturating_sub(last);
            let is_stale = age_ms > context.staleness_threshold_ms();
            let was_stale = self.stalled[&context];

            if is_stale && !was_stale {
                warn!(?context, age_ms, "context heartbeat stalled");
                events.push(StallEvent::Stalled { context, age_ms });
            } else if !is_stale && was_stale {
                events.push(StallEvent::Recovered { context });
            }
            self.stalled.insert(context, is_stale);
        }
        events
    }
}

impl Default for WatchdogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_time_context_defaults_to_no_restart() {
        let policy = RestartPolicy::default_for(Context::RealTime);
        assert!(!policy.enabled);
    }

    #[test]
    fn database_context_defaults_to_bounded_restart() {
        let policy = RestartPolicy::default_for(Context::Database);
        assert!(policy.enabled);
        assert!(policy.max_attempts > 0);
    }

    #[test]
    fn stale_heartbeat_is_reported_once_then_recovery_once() {
        let mut registry = WatchdogRegistry::new();
        let handle = registry.handle(Context::RealTime);
        handle.publish(0);

        assert_eq!(registry.check(50), Vec::new());
        assert_eq!(
            registry.check(500),
            vec![StallEvent::Stalled { context: Context::RealTime, age_ms: 500 }]
        );
        assert_eq!(registry.check(600), Vec::new());

        handle.publish(700);
        assert_eq!(registry.check(720), vec![StallEvent::Recovered { context: Context::RealTime }]);
    }
}
