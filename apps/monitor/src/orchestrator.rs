//! Wires the three execution contexts onto their own OS threads and runs
//! each on a dedicated current-thread Tokio runtime.

use std::thread::JoinHandle;

use tokio::sync::mpsc;
use zmon_transport::TransportConfig;
use zmon_watchdog::Context as WatchdogContext;

use crate::contexts::real_time::AdmissionEvent;
use crate::contexts::{database, network, real_time};
use crate::priority::raise_current_thread_priority;
use crate::shutdown::ShutdownSignal;
use crate::state::AppState;

pub struct Orchestrator {
    real_time: JoinHandle<()>,
    database: JoinHandle<()>,
    network: JoinHandle<()>,
    admission: mpsc::UnboundedSender<AdmissionEvent>,
    real_time_shutdown: ShutdownSignal,
    database_shutdown: ShutdownSignal,
    network_shutdown: ShutdownSignal,
}

impl Orchestrator {
    /// Spawns the real-time, database, and network contexts. Each thread
    /// builds its own single-threaded runtime; the three never share a
    /// Tokio executor so a stall in one can never starve another's
    /// scheduler queue.
    pub fn spawn(state: AppState, sensor_socket_path: String, transport_config: TransportConfig) -> Self {
        let (rt_events_tx, rt_events_rx) = mpsc::unbounded_channel();
        let (sealed_tx, sealed_rx) = mpsc::unbounded_channel();
        let (transport_events_tx, transport_events_rx) = mpsc::unbounded_channel();
        let (admission_tx, admission_rx) = mpsc::unbounded_channel();

        let real_time_shutdown = ShutdownSignal::new();
        let database_shutdown = ShutdownSignal::new();
        let network_shutdown = ShutdownSignal::new();

        let real_time_heartbeat = state.watchdog.lock().expect("watchdog registry mutex poisoned").handle(WatchdogContext::RealTime);
        let database_heartbeat = state.watchdog.lock().expect("watchdog registry mutex poisoned").handle(WatchdogContext::Database);
        let network_heartbeat = state.watchdog.lock().expect("watchdog registry mutex poisoned").handle(WatchdogContext::Network);

        let real_time_state = state.clone();
        let real_time_shutdown_handle = real_time_shutdown.clone();
        let real_time = std::thread::Builder::new()
            .name("zmon-real-time".into())
            .spawn(move || {
                raise_current_thread_priority();
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build real-time context runtime");
                runtime.block_on(real_time::run(
                    real_time_state,
                    sensor_socket_path,
                    real_time_heartbeat,
                    rt_events_tx,
                    sealed_tx,
                    admission_rx,
                    real_time_shutdown_handle,
                ));
            })
            .expect("failed to spawn real-time context thread");

        let database_state = state.clone();
        let database_shutdown_handle = database_shutdown.clone();
        let database = std::thread::Builder::new()
            .name("zmon-database".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build database context runtime");
                runtime.block_on(database::run(
                    database_state,
                    database_heartbeat,
                    rt_events_rx,
                    sealed_rx,
                    transport_events_rx,
                    database_shutdown_handle,
                ));
            })
            .expect("failed to spawn database context thread");

        let network_state = state.clone();
        let network_shutdown_handle = network_shutdown.clone();
        let network = std::thread::Builder::new()
            .name("zmon-network".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build network context runtime");
                runtime.block_on(network::run(
                    network_state,
                    transport_config,
                    network_heartbeat,
                    transport_events_tx,
                    network_shutdown_handle,
                ));
            })
            .expect("failed to spawn network context thread");

        Self { real_time, database, network, admission: admission_tx, real_time_shutdown, database_shutdown, network_shutdown }
    }

    /// Notifies the real-time context that a patient has been admitted,
    /// forcing an immediate telemetry batch seal ahead of the identifier
    /// change before the new MRN is attached.
    pub fn admit_patient(&self, mrn: impl Into<String>) {
        let _ = self.admission.send(AdmissionEvent::Admit(mrn.into()));
    }

    /// Notifies the real-time context that a patient has been discharged,
    /// sealing any in-flight batch under the outgoing MRN first.
    pub fn discharge_patient(&self, mrn: impl Into<String>) {
        let _ = self.admission.send(AdmissionEvent::Discharge(mrn.into()));
    }

    /// Blocks the calling thread until every context thread exits on its
    /// own (fault or external `shutdown()` call from another thread).
    pub fn join(self) {
        let _ = self.real_time.join();
        let _ = self.database.join();
        let _ = self.network.join();
    }

    /// Orderly shutdown: signals components in
    /// reverse data-flow order and waits for each to exit before
    /// signaling the next, so the database context's final persistence
    /// drain — its last act before exiting — is guaranteed to see
    /// everything the real-time context ever wrote to the vitals cache.
    ///
    /// Order: network first (nothing downstream depends on it), then
    /// real-time (stops all further cache writes), then database (drains
    /// and exits last).
    pub fn shutdown(self) {
        self.network_shutdown.trigger();
        let _ = self.network.join();

        self.real_time_shutdown.trigger();
        let _ = self.real_time.join();

        self.database_shutdown.trigger();
        let _ = self.database.join();
    }
}
