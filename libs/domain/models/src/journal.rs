//! Action journal entry: append-only, hash-chained.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Success,
    Failure,
    Partial,
}

/// Closed set of action kinds this appliance journals: human actions
/// (login/logout/admit/discharge/threshold-change/silence/
/// acknowledge/clear-notifications/export/diagnostics-access) and selected
/// security events, plus system events (watchdog restarts, chain breaks).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Login,
    Logout,
    AutoLogout,
    AdmitPatient,
    DischargePatient,
    ThresholdChange,
    SilenceAlarm,
    AcknowledgeAlarm,
    ClearNotifications,
    Export,
    DiagnosticsAccess,
    AuthenticationFailure,
    CertificateInstall,
    CertificateRevoke,
    CertificateValidateFail,
    UnauthorizedAccessAttempt,
    SystemEvent(String),
}

impl ActionKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Login => "LOGIN",
            ActionKind::Logout => "LOGOUT",
            ActionKind::AutoLogout => "AUTO_LOGOUT",
            ActionKind::AdmitPatient => "ADMIT_PATIENT",
            ActionKind::DischargePatient => "DISCHARGE_PATIENT",
            ActionKind::ThresholdChange => "THRESHOLD_CHANGE",
            ActionKind::SilenceAlarm => "SILENCE_ALARM",
            ActionKind::AcknowledgeAlarm => "ACKNOWLEDGE_ALARM",
            ActionKind::ClearNotifications => "CLEAR_NOTIFICATIONS",
            ActionKind::Export => "EXPORT",
            ActionKind::DiagnosticsAccess => "DIAGNOSTICS_ACCESS",
            ActionKind::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            ActionKind::CertificateInstall => "CERTIFICATE_INSTALL",
            ActionKind::CertificateRevoke => "CERTIFICATE_REVOKE",
            ActionKind::CertificateValidateFail => "CERTIFICATE_VALIDATE_FAIL",
            ActionKind::UnauthorizedAccessAttempt => "UNAUTHORIZED_ACCESS_ATTEMPT",
            ActionKind::SystemEvent(s) => s.as_str(),
        }
    }
}

/// Genesis hash for entry 0's `previous_hash`.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionJournalEntry {
    /// Monotonic identifier, assigned by the store on append.
    pub id: u64,
    pub timestamp_ms: u64,
    pub timestamp_iso8601: String,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub action_kind: ActionKind,
    pub target_kind: String,
    pub target_id: String,
    pub details: serde_json::Value,
    pub outcome: ActionOutcome,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub device_id: String,
    pub session_token_hash: Option<String>,
    pub previous_hash: String,
}
