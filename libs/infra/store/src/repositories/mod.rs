pub mod action_log;
pub mod alarms;
pub mod certificates;
pub mod security_audit_log;
pub mod settings;
pub mod telemetry_metrics;
pub mod vitals;

pub use action_log::ActionLogRepository;
pub use alarms::AlarmsRepository;
pub use certificates::CertificatesRepository;
pub use security_audit_log::{SecurityAuditEntry, SecurityAuditLogRepository};
pub use settings::SettingsRepository;
pub use telemetry_metrics::TelemetryRepository;
pub use vitals::VitalsRepository;
