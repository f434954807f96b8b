//! Typed configuration surface: one field per recognized `settings` key,
//! sensible defaults, and a `validate()` invoked on every write.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub device_id: String,
    pub device_label: String,
    pub measurement_unit: MeasurementUnit,

    /// Global per-metric threshold defaults, keyed by the metric's wire
    /// name (e.g. `HEART_RATE`); per-patient overrides live in the alarm
    /// engine, not here.
    pub alarm_low: HashMap<String, f64>,
    pub alarm_high: HashMap<String, f64>,
    pub alarm_silence_duration_s: u32,

    pub network_retry_attempts: u32,
    pub network_retry_delay_s: u32,

    pub retention_vitals_days: u32,
    pub retention_alarms_days: u32,
    pub retention_telemetry_days: u32,
    pub retention_action_log_days: u32,

    pub security_session_timeout_s: u32,

    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            device_label: String::new(),
            measurement_unit: MeasurementUnit::Metric,
            alarm_low: HashMap::new(),
            alarm_high: HashMap::new(),
            // The 120s policy cap on high-priority alarms is the
            // tightest bound; the default silence duration sits
            // comfortably under it.
            alarm_silence_duration_s: 60,
            network_retry_attempts: 10,
            network_retry_delay_s: 1,
            retention_vitals_days: 30,
            retention_alarms_days: 365,
            retention_telemetry_days: 7,
            retention_action_log_days: 365,
            security_session_timeout_s: 900,
            log_level: LogLevel::Info,
            log_format: LogFormat::Human,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("device_id must not be empty")]
    EmptyDeviceId,

    #[error("alarm silence duration must be positive")]
    NonPositiveSilenceDuration,

    #[error("network retry attempts must be at least 1")]
    NoRetryAttempts,

    #[error("retention window for {0} must be at least 1 day")]
    RetentionTooShort(&'static str),

    #[error("session timeout must be at least 30 s")]
    SessionTimeoutTooShort,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::EmptyDeviceId);
        }
        if self.alarm_silence_duration_s == 0 {
            return Err(ConfigError::NonPositiveSilenceDuration);
        }
        if self.network_retry_attempts == 0 {
            return Err(ConfigError::NoRetryAttempts);
        }
        if self.retention_vitals_days == 0 {
            return Err(ConfigError::RetentionTooShort("vitals"));
        }
        if self.retention_alarms_days == 0 {
            return Err(ConfigError::RetentionTooShort("alarms"));
        }
        if self.retention_telemetry_days == 0 {
            return Err(ConfigError::RetentionTooShort("telemetry"));
        }
        if self.retention_action_log_days == 0 {
            return Err(ConfigError::RetentionTooShort("action_log"));
        }
        if self.security_session_timeout_s < 30 {
            return Err(ConfigError::SessionTimeoutTooShort);
        }
        Ok(())
    }

    /// Seeds a `Settings` from a TOML file, for tests and local
    /// development; production loads from the `settings` table instead.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        let mut settings = Settings::default();
        settings.device_id = "dev-1".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn empty_device_id_is_rejected() {
        let settings = Settings::default();
        assert!(matches!(settings.validate(), Err(ConfigError::EmptyDeviceId)));
    }

    #[test]
    fn zero_retention_window_is_rejected() {
        let mut settings = Settings::default();
        settings.device_id = "dev-1".into();
        settings.retention_telemetry_days = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::RetentionTooShort("telemetry"))));
    }
}
