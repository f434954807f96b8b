//! Stable statement identifiers used to tag `tracing` spans and slow-query
//! warnings. Statement text itself still lives next to its call site in
//! each repository rather than being centralized here; this registry
//! exists only to give each hot-path statement a name that survives
//! refactors of the SQL.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementId {
    VitalsInsert,
    VitalsRecentForPatient,
    AlarmsUpsert,
    TelemetryInsert,
    ActionLogAppend,
}

impl StatementId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatementId::VitalsInsert => "vitals.insert",
            StatementId::VitalsRecentForPatient => "vitals.recent_for_patient",
            StatementId::AlarmsUpsert => "alarms.upsert",
            StatementId::TelemetryInsert => "telemetry_metrics.insert",
            StatementId::ActionLogAppend => "action_log.append",
        }
    }

    /// Whether this statement only reads; used by the persistence scheduler
    /// to decide which statements are safe to retry without risk of
    /// duplicate writes.
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, StatementId::VitalsRecentForPatient)
    }
}
