//! Composition root: owns every shared instance and wires them in
//! dependency order. One struct holding every repository/manager behind
//! an `Arc`, constructed once at startup and cloned cheaply into each
//! context.

use std::sync::{Arc, Mutex};

use rustls::ClientConfig;
use zmon_alarm_engine::AlarmEngine;
use zmon_cache::{VitalsCache, WaveformCache};
use zmon_config::Settings;
use zmon_crypto::KeyHandle;
use zmon_journal::Journal;
use zmon_models::DeviceIdentity;
use zmon_store::{
    ActionLogRepository, AlarmsRepository, CertificatesRepository, SecurityAuditLogRepository,
    SettingsRepository, Store, TelemetryRepository, VitalsRepository,
};
use zmon_telemetry_batcher::{OutboundQueue, TelemetryBatcher};
use zmon_watchdog::WatchdogRegistry;

/// Bridges `zmon_config::MeasurementUnit` (the persisted settings type)
/// to `zmon_models::MeasurementUnit` (the type telemetry and the device
/// identity carry); the two crates define the concept independently
/// because one owns the settings schema and the other owns the wire
/// shape, and only the orchestrator needs both.
fn bridge_measurement_unit(unit: zmon_config::MeasurementUnit) -> zmon_models::MeasurementUnit {
    match unit {
        zmon_config::MeasurementUnit::Metric => zmon_models::MeasurementUnit::Metric,
        zmon_config::MeasurementUnit::Imperial => zmon_models::MeasurementUnit::Imperial,
    }
}

pub fn bridge_log_format(format: zmon_config::LogFormat) -> zmon_observability::LogFormat {
    match format {
        zmon_config::LogFormat::Human => zmon_observability::LogFormat::Compact,
        zmon_config::LogFormat::Json => zmon_observability::LogFormat::Json,
    }
}

/// Admission state: the current patient identifier, empty in standby.
/// Read by the real-time context on every record; written by the
/// admission collaborator's notifications.
#[derive(Default)]
pub struct AdmissionState {
    current_patient_mrn: Mutex<String>,
}

impl AdmissionState {
    #[must_use]
    pub fn current(&self) -> String {
        self.current_patient_mrn.lock().expect("admission state mutex poisoned").clone()
    }

    pub fn admit(&self, mrn: String) {
        *self.current_patient_mrn.lock().expect("admission state mutex poisoned") = mrn;
    }

    pub fn discharge(&self) {
        self.current_patient_mrn.lock().expect("admission state mutex poisoned").clear();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub device: DeviceIdentity,
    pub settings: Arc<Settings>,
    pub store: Store,
    pub vitals_repo: Arc<VitalsRepository>,
    pub alarms_repo: Arc<AlarmsRepository>,
    pub telemetry_repo: Arc<TelemetryRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub security_audit_repo: Arc<SecurityAuditLogRepository>,
    pub certificates_repo: Arc<CertificatesRepository>,
    pub settings_repo: Arc<SettingsRepository>,
    pub vitals_cache: Arc<VitalsCache>,
    pub waveform_cache: Arc<WaveformCache>,
    pub alarm_engine: Arc<Mutex<AlarmEngine>>,
    pub outbound_queue: Arc<OutboundQueue>,
    pub journal: Arc<Journal>,
    pub signing_key: Arc<KeyHandle>,
    pub admission: Arc<AdmissionState>,
    pub watchdog: Arc<Mutex<WatchdogRegistry>>,
    pub tls_config: Arc<ClientConfig>,
}

impl AppState {
    pub async fn new(
        settings: Settings,
        store: Store,
        signing_key: KeyHandle,
        thresholds: zmon_alarm_engine::ThresholdResolver,
        tls_config: Arc<ClientConfig>,
    ) -> Self {
        let vitals_repo = Arc::new(VitalsRepository::new(store.clone()));
        let alarms_repo = Arc::new(AlarmsRepository::new(store.clone()));
        let telemetry_repo = Arc::new(TelemetryRepository::new(store.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(store.clone()));
        let security_audit_repo = Arc::new(SecurityAuditLogRepository::new(store.clone()));
        let certificates_repo = Arc::new(CertificatesRepository::new(store.clone()));
        let settings_repo = Arc::new(SettingsRepository::new(store.clone()));

        let journal = Arc::new(Journal::new(ActionLogRepository::new(store.clone())));

        let device = DeviceIdentity {
            device_id: settings.device_id.clone(),
            device_label: settings.device_label.clone(),
            measurement_unit: bridge_measurement_unit(settings.measurement_unit),
        };

        Self {
            device,
            settings: Arc::new(settings),
            store,
            vitals_repo,
            alarms_repo,
            telemetry_repo,
            action_log_repo,
            security_audit_repo,
            certificates_repo,
            settings_repo,
            vitals_cache: Arc::new(VitalsCache::with_default_capacity()),
            waveform_cache: Arc::new(WaveformCache::with_default_capacity()),
            alarm_engine: Arc::new(Mutex::new(AlarmEngine::new(thresholds))),
            outbound_queue: Arc::new(OutboundQueue::with_default_capacity()),
            journal,
            signing_key: Arc::new(signing_key),
            admission: Arc::new(AdmissionState::default()),
            watchdog: Arc::new(Mutex::new(WatchdogRegistry::new())),
            tls_config,
        }
    }

    #[must_use]
    pub fn new_batcher(&self) -> TelemetryBatcher {
        TelemetryBatcher::new(self.device.clone(), Arc::clone(&self.signing_key), Arc::clone(&self.outbound_queue))
    }
}
