//! Serializable form of rule/lock state.
//!
//! Wire shape (JSON):
//!
//! ```text
//! { "version": 1,
//!   "rules": [["kiwi", {"normalizedText": "kiwi", "categoryId": "...",
//!                        "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "..."}]],
//!   "locks": [["<fingerprint>", {"fingerprint": "...", "categoryId": "...",
//!                                "lockedAt": "...", "reason": "..."}]] }
//! ```
//!
//! Pairs are sorted by key. Unknown versions are rejected, never coerced.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use crate::classify::ClassifierState;
use crate::locks::{LockStore, TransactionLock};
use crate::rules::{CategoryRule, RuleStore};
use crate::transaction::normalize_text;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing or non-numeric snapshot version")]
    MissingVersion,

    #[error("unsupported snapshot version {0} (expected {expected})", expected = SNAPSHOT_VERSION)]
    UnsupportedVersion(u64),

    #[error("duplicate {kind} key '{key}'")]
    DuplicateKey { kind: &'static str, key: String },

    #[error("{kind} key '{key}' does not match its record")]
    KeyMismatch { kind: &'static str, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub rules: Vec<(String, CategoryRule)>,
    pub locks: Vec<(String, TransactionLock)>,
}

impl Snapshot {
    pub fn from_state(state: &ClassifierState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            rules: state
                .rules
                .list_rules()
                .into_iter()
                .map(|r| (r.normalized_text.clone(), r.clone()))
                .collect(),
            locks: state
                .locks
                .list_locks()
                .into_iter()
                .map(|l| (l.fingerprint.clone(), l.clone()))
                .collect(),
        }
    }

    pub fn into_state(self) -> ClassifierState {
        ClassifierState::new(
            RuleStore::from_rules(self.rules.into_iter().map(|(_, r)| r)),
            LockStore::from_locks(self.locks.into_iter().map(|(_, l)| l)),
        )
    }

    pub fn parse(s: &str) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        Self::from_value(value)
    }

    /// Check the version first, then shape, then key consistency.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SnapshotError> {
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or(SnapshotError::MissingVersion)?;
        if version != u64::from(SNAPSHOT_VERSION) {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let snapshot: Snapshot = serde_json::from_value(value)?;
        snapshot.check_keys()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn check_keys(&self) -> Result<(), SnapshotError> {
        let mut seen = HashSet::new();
        for (key, rule) in &self.rules {
            if key.is_empty() || *key != rule.normalized_text || *key != normalize_text(key) {
                return Err(SnapshotError::KeyMismatch {
                    kind: "rule",
                    key: key.clone(),
                });
            }
            if !seen.insert(key.as_str()) {
                return Err(SnapshotError::DuplicateKey {
                    kind: "rule",
                    key: key.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for (key, lock) in &self.locks {
            if key.is_empty() || *key != lock.fingerprint {
                return Err(SnapshotError::KeyMismatch {
                    kind: "lock",
                    key: key.clone(),
                });
            }
            if !seen.insert(key.as_str()) {
                return Err(SnapshotError::DuplicateKey {
                    kind: "lock",
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Cheap go/no-go for a persistence layer before it rebuilds state.
pub fn validate_snapshot(data: &serde_json::Value) -> bool {
    match Snapshot::from_value(data.clone()) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "snapshot rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn state() -> ClassifierState {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ClassifierState::new(
            RuleStore::new()
                .set_rule("REMA", "groceries", t)
                .set_rule("kiwi", "groceries", t),
            LockStore::new().lock("abc123", "gifts", Some("gift card"), t),
        )
    }

    #[test]
    fn pairs_are_sorted_and_timestamps_are_iso8601() {
        let snap = Snapshot::from_state(&state());
        let keys: Vec<_> = snap.rules.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["kiwi", "rema"]);

        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["rules"][0][1]["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(value["locks"][0][1]["reason"], "gift card");
    }

    #[test]
    fn validate_accepts_own_output() {
        let value = serde_json::to_value(Snapshot::from_state(&state())).unwrap();
        assert!(validate_snapshot(&value));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = Snapshot::from_value(json!({"version": 2, "rules": [], "locks": []})).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion(2)));
        assert!(!validate_snapshot(&json!({"rules": [], "locks": []})));
        assert_eq!(err.to_string(), "unsupported snapshot version 2 (expected 1)");
    }

    #[test]
    fn mismatched_or_duplicate_keys_are_rejected() {
        let rule = json!({
            "normalizedText": "kiwi", "categoryId": "groceries",
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        });
        let mismatched = json!({"version": 1, "rules": [["KIWI", rule]], "locks": []});
        assert!(matches!(
            Snapshot::from_value(mismatched).unwrap_err(),
            SnapshotError::KeyMismatch { kind: "rule", .. }
        ));

        let dup = json!({"version": 1, "rules": [["kiwi", rule], ["kiwi", rule]], "locks": []});
        assert!(matches!(
            Snapshot::from_value(dup).unwrap_err(),
            SnapshotError::DuplicateKey { kind: "rule", .. }
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(Snapshot::parse("{not json"), Err(SnapshotError::Malformed(_))));
        assert!(!validate_snapshot(&json!({"version": 1, "rules": "nope", "locks": []})));
    }
}
