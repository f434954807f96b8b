//! Action journal repository.
//!
//! Hash-chain computation lives in `zmon-journal`; this repository only
//! appends rows and hands back what that crate needs to keep the chain
//! going (the previous entry's hash) or to verify it (every entry in order).

use libsql::params;
use tracing::instrument;
use zmon_models::{ActionJournalEntry, ActionKind, ActionOutcome};

use crate::client::Store;
use crate::error::StoreError;

pub struct ActionLogRepository {
    store: Store,
}

impl ActionLogRepository {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, entry))]
    pub async fn append(&self, entry: &ActionJournalEntry) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "INSERT INTO action_log (timestamp_ms, timestamp_iso8601, user_id, user_role, action_kind,
                target_kind, target_id, details_json, result, error_code, error_message, device_id,
                session_token_hash, previous_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                entry.timestamp_ms as i64,
                entry.timestamp_iso8601.clone(),
                entry.user_id.clone(),
                entry.user_role.clone(),
                entry.action_kind.as_str().to_string(),
                entry.target_kind.clone(),
                entry.target_id.clone(),
                entry.details.to_string(),
                outcome_str(entry.outcome).to_string(),
                entry.error_code.clone(),
                entry.error_message.clone(),
                entry.device_id.clone(),
                entry.session_token_hash.clone(),
                entry.previous_hash.clone(),
            ],
        )
        .await?;
        let id = conn.last_insert_rowid();
        Ok(id as u64)
    }

    /// The most recently appended entry, for the caller to chain a new
    /// entry's `previous_hash` off of. `None` when the journal is empty.
    pub async fn last_entry(&self) -> Result<Option<ActionJournalEntry>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, timestamp_ms, timestamp_iso8601, user_id, user_role, action_kind,
                    target_kind, target_id, details_json, result, error_code, error_message,
                    device_id, session_token_hash, previous_hash
                 FROM action_log ORDER BY id DESC LIMIT 1",
                (),
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// All entries in append order, for chain verification.
    pub async fn all_in_order(&self) -> Result<Vec<ActionJournalEntry>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, timestamp_ms, timestamp_iso8601, user_id, user_role, action_kind,
                    target_kind, target_id, details_json, result, error_code, error_message,
                    device_id, session_token_hash, previous_hash
                 FROM action_log ORDER BY id ASC",
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_entry(&row)?);
        }
        Ok(out)
    }
}

fn row_to_entry(row: &libsql::Row) -> Result<ActionJournalEntry, StoreError> {
    let id: i64 = row.get(0)?;
    let timestamp_ms: i64 = row.get(1)?;
    let timestamp_iso8601: String = row.get(2)?;
    let user_id: Option<String> = row.get(3)?;
    let user_role: Option<String> = row.get(4)?;
    let action_kind: String = row.get(5)?;
    let target_kind: String = row.get(6)?;
    let target_id: String = row.get(7)?;
    let details_json: String = row.get(8)?;
    let result: String = row.get(9)?;
    let error_code: Option<String> = row.get(10)?;
    let error_message: Option<String> = row.get(11)?;
    let device_id: String = row.get(12)?;
    let session_token_hash: Option<String> = row.get(13)?;
    let previous_hash: String = row.get(14)?;

    Ok(ActionJournalEntry {
        id: id as u64,
        timestamp_ms: timestamp_ms as u64,
        timestamp_iso8601,
        user_id,
        user_role,
        action_kind: ActionKind::SystemEvent(action_kind),
        target_kind,
        target_id,
        details: serde_json::from_str(&details_json).unwrap_or(serde_json::json!({})),
        outcome: parse_outcome(&result).map_err(StoreError::Mapping)?,
        error_code,
        error_message,
        device_id,
        session_token_hash,
        previous_hash,
    })
}

fn outcome_str(outcome: ActionOutcome) -> &'static str {
    match outcome {
        ActionOutcome::Success => "success",
        ActionOutcome::Failure => "failure",
        ActionOutcome::Partial => "partial",
    }
}

fn parse_outcome(raw: &str) -> Result<ActionOutcome, String> {
    match raw {
        "success" => Ok(ActionOutcome::Success),
        "failure" => Ok(ActionOutcome::Failure),
        "partial" => Ok(ActionOutcome::Partial),
        other => Err(format!("unknown action outcome: {other}")),
    }
}
