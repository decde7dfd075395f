//! Classification engine.
//!
//! `classify` rebuilds the whole categorized view from raw transactions plus
//! rule/lock state on every call. Nothing is patched incrementally, so after
//! any mutation the answer is always "classify again". Locks are consulted
//! before rules; no rule change can move a locked occurrence.

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::locks::LockStore;
use crate::rules::RuleStore;
use crate::transaction::{Transaction, TransactionId, normalize_text};

/// Everything classification depends on besides the transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierState {
    pub rules: RuleStore,
    pub locks: LockStore,
}

impl ClassifierState {
    pub fn new(rules: RuleStore, locks: LockStore) -> Self {
        Self { rules, locks }
    }
}

/// Per-transaction state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationStatus {
    Uncategorized,
    RuleMatched,
    Locked,
}

/// Derived view of one transaction. Never edited by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedTransaction {
    pub id: TransactionId,
    pub transaction: Transaction,
    pub fingerprint: String,
    pub category_id: Option<String>,
    pub is_locked: bool,
}

impl CategorizedTransaction {
    pub fn status(&self) -> CategorizationStatus {
        match (self.is_locked, &self.category_id) {
            (true, _) => CategorizationStatus::Locked,
            (false, Some(_)) => CategorizationStatus::RuleMatched,
            (false, None) => CategorizationStatus::Uncategorized,
        }
    }

    pub fn normalized_text(&self) -> String {
        self.transaction.normalized_text()
    }
}

/// Counts over a single classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    pub total: usize,
    pub categorized: usize,
    pub uncategorized: usize,
    pub locked: usize,
    pub rules_applied: usize,
}

/// Text-pattern coverage derived from a categorized list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatternStats {
    pub unique_text_patterns: usize,
    pub patterns_with_rules: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub categorized: Vec<CategorizedTransaction>,
    pub stats: ClassificationStats,
}

/// Classify every transaction. Total: unmatched transactions come back
/// uncategorized, never as an error.
///
/// `TransactionId`s are the positions in `transactions`.
pub fn classify(transactions: &[Transaction], state: &ClassifierState) -> Classification {
    let mut stats = ClassificationStats {
        total: transactions.len(),
        ..ClassificationStats::default()
    };

    let categorized: Vec<CategorizedTransaction> = transactions
        .iter()
        .enumerate()
        .map(|(i, tx)| {
            let fingerprint = tx.fingerprint();

            let (category_id, is_locked) = if let Some(lock) = state.locks.get_lock(&fingerprint) {
                stats.locked += 1;
                (Some(lock.category_id.clone()), true)
            } else if let Some(rule) = state.rules.get_normalized(&normalize_text(&tx.text)) {
                stats.rules_applied += 1;
                (Some(rule.category_id.clone()), false)
            } else {
                (None, false)
            };

            if category_id.is_some() {
                stats.categorized += 1;
            } else {
                stats.uncategorized += 1;
            }

            CategorizedTransaction {
                id: TransactionId(i),
                transaction: tx.clone(),
                fingerprint,
                category_id,
                is_locked,
            }
        })
        .collect();

    debug!(
        total = stats.total,
        categorized = stats.categorized,
        locked = stats.locked,
        rules_applied = stats.rules_applied,
        "classification pass"
    );

    Classification { categorized, stats }
}

pub fn pattern_stats(categorized: &[CategorizedTransaction], rules: &RuleStore) -> PatternStats {
    let patterns: HashSet<String> = categorized.iter().map(|c| c.normalized_text()).collect();
    let patterns_with_rules = patterns
        .iter()
        .filter(|p| rules.get_normalized(p).is_some())
        .count();
    PatternStats {
        unique_text_patterns: patterns.len(),
        patterns_with_rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn tx(day: u32, amount: f64, text: &str) -> Transaction {
        Transaction::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), amount, text)
    }

    fn sample() -> Vec<Transaction> {
        vec![tx(1, -100.0, "KIWI"), tx(2, -50.0, "KIWI"), tx(3, -30.0, "REMA")]
    }

    #[test]
    fn empty_state_leaves_everything_uncategorized() {
        let out = classify(&sample(), &ClassifierState::default());
        assert_eq!(out.stats.total, 3);
        assert_eq!(out.stats.uncategorized, 3);
        assert!(out.categorized.iter().all(|c| c.status() == CategorizationStatus::Uncategorized));
    }

    #[test]
    fn rules_match_on_normalized_text() {
        let state = ClassifierState::new(
            RuleStore::new().set_rule("kiwi", "cat_food", now()),
            LockStore::new(),
        );
        let out = classify(&sample(), &state);
        assert_eq!(out.categorized[0].category_id.as_deref(), Some("cat_food"));
        assert_eq!(out.categorized[1].category_id.as_deref(), Some("cat_food"));
        assert_eq!(out.categorized[2].category_id, None);
        assert_eq!(out.stats.rules_applied, 2);
    }

    #[test]
    fn lock_beats_rule() {
        let txs = sample();
        let fp = txs[0].fingerprint();
        let state = ClassifierState::new(
            RuleStore::new().set_rule("kiwi", "cat_food", now()),
            LockStore::new().lock(&fp, "cat_home", None, now()),
        );
        let out = classify(&txs, &state);
        assert_eq!(out.categorized[0].category_id.as_deref(), Some("cat_home"));
        assert!(out.categorized[0].is_locked);
        assert_eq!(out.categorized[0].status(), CategorizationStatus::Locked);
        assert_eq!(out.categorized[1].category_id.as_deref(), Some("cat_food"));
        assert_eq!(out.stats.locked, 1);
        assert_eq!(out.stats.rules_applied, 1);
    }

    #[test]
    fn classify_is_idempotent() {
        let txs = sample();
        let state = ClassifierState::new(
            RuleStore::new().set_rule("rema", "cat_food", now()),
            LockStore::new().lock(&txs[1].fingerprint(), "cat_home", None, now()),
        );
        assert_eq!(classify(&txs, &state), classify(&txs, &state));
    }

    #[test]
    fn pattern_stats_counts_distinct_texts() {
        let txs = vec![tx(1, -1.0, "KIWI"), tx(2, -1.0, " kiwi "), tx(3, -1.0, "REMA")];
        let rules = RuleStore::new().set_rule("kiwi", "cat_food", now());
        let out = classify(&txs, &ClassifierState::new(rules.clone(), LockStore::new()));
        let p = pattern_stats(&out.categorized, &rules);
        assert_eq!(p.unique_text_patterns, 2);
        assert_eq!(p.patterns_with_rules, 1);
    }
}
