//! Manual exceptions pinned to one transaction occurrence by fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLock {
    pub fingerprint: String,
    pub category_id: String,
    pub locked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Copy-on-write fingerprint -> lock map. Same value semantics as
/// [`crate::rules::RuleStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockStore {
    locks: Arc<HashMap<String, TransactionLock>>,
}

impl LockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Upsert. Re-locking replaces category, reason and timestamp.
    pub fn lock(
        mut self,
        fingerprint: &str,
        category_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Arc::make_mut(&mut self.locks).insert(
            fingerprint.to_string(),
            TransactionLock {
                fingerprint: fingerprint.to_string(),
                category_id: category_id.to_string(),
                locked_at: now,
                reason: reason.map(str::to_string),
            },
        );
        self
    }

    pub fn unlock(mut self, fingerprint: &str) -> Self {
        if self.locks.contains_key(fingerprint) {
            Arc::make_mut(&mut self.locks).remove(fingerprint);
        }
        self
    }

    pub fn is_locked(&self, fingerprint: &str) -> bool {
        self.locks.contains_key(fingerprint)
    }

    pub fn get_lock(&self, fingerprint: &str) -> Option<&TransactionLock> {
        self.locks.get(fingerprint)
    }

    /// All locks sorted by fingerprint.
    pub fn list_locks(&self) -> Vec<&TransactionLock> {
        let mut out: Vec<_> = self.locks.values().collect();
        out.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        out
    }

    pub(crate) fn from_locks(locks: impl IntoIterator<Item = TransactionLock>) -> Self {
        Self {
            locks: Arc::new(
                locks
                    .into_iter()
                    .map(|l| (l.fingerprint.clone(), l))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 8, 30, 0).unwrap()
    }

    #[test]
    fn lock_then_unlock() {
        let locks = LockStore::new().lock("fp1", "home", Some("gift card"), t(1));
        assert!(locks.is_locked("fp1"));
        let lock = locks.get_lock("fp1").unwrap();
        assert_eq!(lock.category_id, "home");
        assert_eq!(lock.reason.as_deref(), Some("gift card"));

        let locks = locks.unlock("fp1");
        assert!(!locks.is_locked("fp1"));
        assert!(locks.is_empty());
    }

    #[test]
    fn relock_overwrites() {
        let locks = LockStore::new()
            .lock("fp1", "home", Some("gift card"), t(1))
            .lock("fp1", "food", None, t(3));
        assert_eq!(locks.len(), 1);
        let lock = locks.get_lock("fp1").unwrap();
        assert_eq!(lock.category_id, "food");
        assert_eq!(lock.reason, None);
        assert_eq!(lock.locked_at, t(3));
    }

    #[test]
    fn earlier_clone_keeps_its_view() {
        let locks = LockStore::new().lock("fp1", "home", None, t(1));
        let reader = locks.clone();
        let next = locks.unlock("fp1").lock("fp2", "food", None, t(2));
        assert!(reader.is_locked("fp1"));
        assert!(!reader.is_locked("fp2"));
        assert!(!next.is_locked("fp1"));
        assert!(next.is_locked("fp2"));
    }
}
