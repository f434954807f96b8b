//! Encrypted local store: connection management, numbered
//! migrations, and one repository per table.

pub mod client;
pub mod error;
pub mod migrations;
pub mod repositories;
pub mod statements;

pub use client::Store;
pub use error::StoreError;
pub use repositories::{
    ActionLogRepository, AlarmsRepository, CertificatesRepository, SecurityAuditEntry,
    SecurityAuditLogRepository, SettingsRepository, TelemetryRepository, VitalsRepository,
};
pub use statements::StatementId;
