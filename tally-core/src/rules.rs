//! Text rules: "if the text looks like X, put it in category Y".
//!
//! `RuleStore` is a value. Mutators consume the store and hand back the next
//! one; the map sits behind an `Arc`, so a reader that cloned the previous
//! store keeps seeing exactly what it cloned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::transaction::normalize_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRule {
    pub normalized_text: String,
    pub category_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleStore {
    rules: Arc<HashMap<String, CategoryRule>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Upsert keyed by the normalized text. An existing rule keeps its
    /// `created_at`; `updated_at` moves to `now`. Blank text is ignored.
    pub fn set_rule(mut self, text: &str, category_id: &str, now: DateTime<Utc>) -> Self {
        let key = normalize_text(text);
        if key.is_empty() {
            return self;
        }
        let rules = Arc::make_mut(&mut self.rules);
        match rules.get_mut(&key) {
            Some(existing) => {
                existing.category_id = category_id.to_string();
                existing.updated_at = now;
            }
            None => {
                rules.insert(
                    key.clone(),
                    CategoryRule {
                        normalized_text: key,
                        category_id: category_id.to_string(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        self
    }

    pub fn delete_rule(mut self, text: &str) -> Self {
        let key = normalize_text(text);
        if self.rules.contains_key(&key) {
            Arc::make_mut(&mut self.rules).remove(&key);
        }
        self
    }

    /// Lookup by any spelling of the text.
    pub fn get_rule(&self, text: &str) -> Option<&CategoryRule> {
        self.rules.get(&normalize_text(text))
    }

    /// Lookup by an already-normalized key; the hot path during classification.
    pub(crate) fn get_normalized(&self, key: &str) -> Option<&CategoryRule> {
        self.rules.get(key)
    }

    /// All rules sorted by normalized text.
    pub fn list_rules(&self) -> Vec<&CategoryRule> {
        let mut out: Vec<_> = self.rules.values().collect();
        out.sort_by(|a, b| a.normalized_text.cmp(&b.normalized_text));
        out
    }

    /// Rebuild from persisted rules. Later duplicates of a key win.
    pub(crate) fn from_rules(rules: impl IntoIterator<Item = CategoryRule>) -> Self {
        Self {
            rules: Arc::new(
                rules
                    .into_iter()
                    .map(|r| (r.normalized_text.clone(), r))
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
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn upsert_is_case_insensitive_and_keeps_created_at() {
        let rules = RuleStore::new()
            .set_rule("KIWI", "cat_a", t(1))
            .set_rule("kiwi", "cat_b", t(5));

        assert_eq!(rules.len(), 1);
        let rule = rules.get_rule("kiwi").unwrap();
        assert_eq!(rule.normalized_text, "kiwi");
        assert_eq!(rule.category_id, "cat_b");
        assert_eq!(rule.created_at, t(1));
        assert_eq!(rule.updated_at, t(5));
    }

    #[test]
    fn lookup_trims_and_lowercases() {
        let rules = RuleStore::new().set_rule("  Rema 1000 ", "food", t(1));
        assert!(rules.get_rule("REMA 1000").is_some());
        assert!(rules.get_rule("rema").is_none());
    }

    #[test]
    fn prior_store_is_untouched_by_mutation() {
        let before = RuleStore::new().set_rule("kiwi", "food", t(1));
        let reader = before.clone();
        let after = before.set_rule("rema", "food", t(2)).delete_rule("kiwi");

        assert_eq!(reader.len(), 1);
        assert!(reader.get_rule("kiwi").is_some());
        assert_eq!(after.len(), 1);
        assert!(after.get_rule("kiwi").is_none());
    }

    #[test]
    fn blank_text_is_ignored() {
        let rules = RuleStore::new().set_rule("   ", "food", t(1));
        assert!(rules.is_empty());
    }

    #[test]
    fn delete_missing_is_a_noop() {
        let rules = RuleStore::new().set_rule("kiwi", "food", t(1));
        let same = rules.clone().delete_rule("rema");
        assert_eq!(rules, same);
    }

    #[test]
    fn list_is_sorted() {
        let rules = RuleStore::new()
            .set_rule("rema", "food", t(1))
            .set_rule("circle k", "car", t(1))
            .set_rule("kiwi", "food", t(1));
        let keys: Vec<_> = rules.list_rules().iter().map(|r| r.normalized_text.as_str()).collect();
        assert_eq!(keys, vec!["circle k", "kiwi", "rema"]);
    }
}
