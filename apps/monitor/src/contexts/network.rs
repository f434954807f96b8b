//! Network context: runs the mTLS delivery loop against the
//! central dispatch server. Isolated on its own OS thread so a stalled
//! connection never blocks sensor ingress or database writes.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tokio_rustls::TlsConnector;

use zmon_journal::Journal;
use zmon_store::ActionLogRepository;
use zmon_transport::{DeliveryLoop, TransportConfig, TransportEvent};
use zmon_watchdog::Heartbeat;

use crate::shutdown::ShutdownSignal;
use crate::state::AppState;

fn now_wall_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

pub async fn run(
    state: AppState,
    config: TransportConfig,
    heartbeat: Heartbeat,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    shutdown: ShutdownSignal,
) {
    let connector = TlsConnector::from(state.tls_config.clone());
    let journal = Journal::new(ActionLogRepository::new(state.store.clone()));
    let delivery = DeliveryLoop::new(connector, config, state.outbound_queue.clone(), journal, events_tx);

    let mut heartbeat_tick = interval(Duration::from_millis(500));
    let heartbeat_shutdown = shutdown.clone();
    let heartbeat_loop = async move {
        loop {
            tokio::select! {
                _ = heartbeat_tick.tick() => heartbeat.publish(now_wall_ms()),
                _ = heartbeat_shutdown.wait() => break,
            }
        }
    };
    // Both branches run until the process shuts down; `join!` drives them
    // concurrently on this context's single-threaded runtime. The outbound
    // queue is deliberately not drained here — `delivery.run` just stops
    // dequeuing, leaving whatever is pending for the next boot.
    tokio::join!(delivery.run(shutdown.atomic()), heartbeat_loop);
}
