//! Canonical serialization and hashing: SHA-256 over the canonical,
//! stable-key-order serialization of the preceding entry.

use sha2::{Digest, Sha256};
use zmon_models::ActionJournalEntry;

/// `serde_json` emits struct fields in declaration order and, without the
/// `preserve_order` feature, backs `Value::Object` with a `BTreeMap` —
/// both orderings are fixed for a given entry, which is the stability this
/// hash depends on.
#[must_use]
pub fn canonical_bytes(entry: &ActionJournalEntry) -> Vec<u8> {
    serde_json::to_vec(entry).expect("ActionJournalEntry serialization cannot fail")
}

#[must_use]
pub fn hash_entry(entry: &ActionJournalEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(entry));
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmon_models::{ActionKind, ActionOutcome};

    fn sample() -> ActionJournalEntry {
        ActionJournalEntry {
            id: 1,
            timestamp_ms: 1_000,
            timestamp_iso8601: "1970-01-01T00:00:01Z".into(),
            user_id: Some("nurse-1".into()),
            user_role: Some("clinician".into()),
            action_kind: ActionKind::Login,
            target_kind: "session".into(),
            target_id: "sess-1".into(),
            details: serde_json::json!({"ip": "10.0.0.1"}),
            outcome: ActionOutcome::Success,
            error_code: None,
            error_message: None,
            device_id: "dev-1".into(),
            session_token_hash: None,
            previous_hash: "genesis".into(),
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_entry(&sample()), hash_entry(&sample()));
    }

    #[test]
    fn changing_any_field_changes_the_hash() {
        let mut other = sample();
        other.target_id = "sess-2".into();
        assert_ne!(hash_entry(&sample()), hash_entry(&other));
    }
}
