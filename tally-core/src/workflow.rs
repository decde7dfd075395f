//! Mutation workflows over an application-owned `Ledger` value.
//!
//! Every operation is `(&Ledger, input) -> Ledger`: the receiver is never
//! touched, and the returned ledger has already been reclassified from
//! scratch. A rejected action returns an error and nothing else changes.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::category::CategoryRegistry;
use crate::classify::{
    CategorizedTransaction, Classification, ClassificationStats, ClassifierState, PatternStats,
    classify, pattern_stats,
};
use crate::error::{CategorizeError, Result};
use crate::locks::LockStore;
use crate::rules::RuleStore;
use crate::transaction::{Transaction, TransactionId, normalize_text};

/// How a single `categorize` call records the choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizeOptions {
    /// Upsert a rule for the transaction's text. This recategorizes every
    /// other transaction with the same text too. When false the occurrence
    /// is pinned with a lock instead.
    pub create_rule: bool,
    /// Attached to the lock when `create_rule` is false.
    pub reason: Option<String>,
}

impl CategorizeOptions {
    pub fn create_rule() -> Self {
        Self {
            create_rule: true,
            reason: None,
        }
    }

    pub fn pin(reason: Option<&str>) -> Self {
        Self {
            create_rule: false,
            reason: reason.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// One rule upsert per distinct raw text among the selection.
    CreateRule,
    /// Lock every selected occurrence individually.
    LockAsException,
}

/// Target of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkTarget {
    Category(String),
    /// Unlock every selected transaction instead of assigning.
    Uncategorize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub duplicates: usize,
}

/// Reducer input. See [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Import(Vec<Transaction>),
    SetRule {
        text: String,
        category_id: String,
    },
    DeleteRule {
        text: String,
    },
    Lock {
        fingerprint: String,
        category_id: String,
        reason: Option<String>,
    },
    Unlock {
        fingerprint: String,
    },
    Categorize {
        id: TransactionId,
        category_id: String,
        options: CategorizeOptions,
    },
    BulkCategorize {
        ids: Vec<TransactionId>,
        target: BulkTarget,
        mode: BulkMode,
        reason: Option<String>,
    },
    DeriveRule {
        id: TransactionId,
    },
    FixInvalidCategorizations,
    Select(TransactionId),
    Deselect(TransactionId),
    ClearSelection,
    ReplaceRegistry(CategoryRegistry),
}

/// Everything the engine knows in one session: transactions, category
/// registry snapshot, rule/lock state, the derived classification and the
/// UI selection.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    transactions: Arc<Vec<Transaction>>,
    known: Arc<HashSet<String>>,
    registry: Arc<CategoryRegistry>,
    state: ClassifierState,
    classification: Arc<Classification>,
    selection: BTreeSet<TransactionId>,
}

impl Ledger {
    pub fn new(registry: CategoryRegistry, state: ClassifierState) -> Self {
        Self {
            registry: Arc::new(registry),
            state,
            ..Self::default()
        }
    }

    /// Restore a persisted transaction list as-is (no de-duplication).
    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.known = Arc::new(transactions.iter().map(Transaction::fingerprint).collect());
        self.transactions = Arc::new(transactions);
        self.selection.clear();
        self.reclassify()
    }

    // ---------------------------------------------------------------------
    // Read side
    // ---------------------------------------------------------------------

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn categorized(&self) -> &[CategorizedTransaction] {
        &self.classification.categorized
    }

    pub fn stats(&self) -> ClassificationStats {
        self.classification.stats
    }

    pub fn pattern_stats(&self) -> PatternStats {
        pattern_stats(&self.classification.categorized, &self.state.rules)
    }

    pub fn get(&self, id: TransactionId) -> Option<&CategorizedTransaction> {
        self.classification.categorized.get(id.0)
    }

    pub fn uncategorized(&self) -> impl Iterator<Item = &CategorizedTransaction> {
        self.categorized().iter().filter(|c| c.category_id.is_none())
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn rules(&self) -> &RuleStore {
        &self.state.rules
    }

    pub fn locks(&self) -> &LockStore {
        &self.state.locks
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn is_known(&self, fingerprint: &str) -> bool {
        self.known.contains(fingerprint)
    }

    pub fn selected_ids(&self) -> Vec<TransactionId> {
        self.selection.iter().copied().collect()
    }

    // ---------------------------------------------------------------------
    // Import
    // ---------------------------------------------------------------------

    /// Append every transaction whose fingerprint is not already known.
    ///
    /// Records that repeat within `incoming` are all kept; only fingerprints
    /// from earlier imports count as duplicates.
    pub fn import(&self, incoming: impl IntoIterator<Item = Transaction>) -> (Ledger, ImportSummary) {
        let mut next = self.clone();
        let mut summary = ImportSummary::default();
        {
            let txs = Arc::make_mut(&mut next.transactions);
            let known = Arc::make_mut(&mut next.known);
            for tx in incoming {
                let fp = tx.fingerprint();
                if self.known.contains(&fp) {
                    summary.duplicates += 1;
                    continue;
                }
                known.insert(fp);
                txs.push(tx);
                summary.added += 1;
            }
        }
        info!(added = summary.added, duplicates = summary.duplicates, "import");
        (next.reclassify(), summary)
    }

    // ---------------------------------------------------------------------
    // Rule / lock CRUD
    // ---------------------------------------------------------------------

    pub fn set_rule(&self, text: &str, category_id: &str, now: DateTime<Utc>) -> Result<Ledger> {
        self.check_leaf(category_id)?;
        check_rule_text(text)?;
        info!(text, category_id, "set rule");
        let mut state = self.state.clone();
        state.rules = state.rules.set_rule(text, category_id, now);
        Ok(self.with_state(state))
    }

    pub fn delete_rule(&self, text: &str) -> Ledger {
        info!(text, "delete rule");
        let mut state = self.state.clone();
        state.rules = state.rules.delete_rule(text);
        self.with_state(state)
    }

    pub fn lock(
        &self,
        fingerprint: &str,
        category_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Ledger> {
        self.check_leaf(category_id)?;
        info!(fingerprint, category_id, "lock");
        let mut state = self.state.clone();
        state.locks = state.locks.lock(fingerprint, category_id, reason, now);
        Ok(self.with_state(state))
    }

    pub fn unlock(&self, fingerprint: &str) -> Ledger {
        info!(fingerprint, "unlock");
        let mut state = self.state.clone();
        state.locks = state.locks.unlock(fingerprint);
        self.with_state(state)
    }

    pub fn unlock_transaction(&self, id: TransactionId) -> Result<Ledger> {
        let fingerprint = self.entry(id)?.fingerprint.clone();
        Ok(self.unlock(&fingerprint))
    }

    // ---------------------------------------------------------------------
    // Workflows
    // ---------------------------------------------------------------------

    /// Assign one transaction to a leaf category.
    ///
    /// Locked transactions are rejected; they have to be unlocked first.
    pub fn categorize(
        &self,
        id: TransactionId,
        category_id: &str,
        options: &CategorizeOptions,
        now: DateTime<Utc>,
    ) -> Result<Ledger> {
        let entry = self.entry(id)?;
        if entry.is_locked {
            warn!(%id, "categorize rejected: transaction is locked");
            return Err(CategorizeError::LockedTransaction {
                id,
                fingerprint: entry.fingerprint.clone(),
            });
        }
        self.check_leaf(category_id)?;

        if options.create_rule {
            check_rule_text(&entry.transaction.text)?;
        }

        let mut state = self.state.clone();
        if options.create_rule {
            info!(%id, text = %entry.transaction.text, category_id, "categorize via rule");
            state.rules = state.rules.set_rule(&entry.transaction.text, category_id, now);
        } else {
            info!(%id, category_id, "categorize via lock");
            let reason = options.reason.as_deref();
            state.locks = state.locks.lock(&entry.fingerprint, category_id, reason, now);
        }
        Ok(self.with_state(state))
    }

    /// Apply one decision to many transactions, reclassify once and clear
    /// the selection. Every id is resolved before anything changes.
    pub fn bulk_categorize(
        &self,
        ids: &[TransactionId],
        target: &BulkTarget,
        mode: BulkMode,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Ledger> {
        let entries = ids
            .iter()
            .map(|id| self.entry(*id))
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.clone();
        match target {
            BulkTarget::Uncategorize => {
                for e in &entries {
                    state.locks = state.locks.unlock(&e.fingerprint);
                }
                info!(count = entries.len(), "bulk uncategorize");
            }
            BulkTarget::Category(category_id) => {
                let category_id = category_id.as_str();
                self.check_leaf(category_id)?;
                match mode {
                    BulkMode::LockAsException => {
                        for e in &entries {
                            state.locks = state.locks.lock(&e.fingerprint, category_id, reason, now);
                        }
                        info!(count = entries.len(), category_id, "bulk lock");
                    }
                    BulkMode::CreateRule => {
                        let texts: BTreeSet<&str> =
                            entries.iter().map(|e| e.transaction.text.as_str()).collect();
                        for text in &texts {
                            check_rule_text(text)?;
                        }
                        for text in &texts {
                            state.rules = state.rules.set_rule(text, category_id, now);
                        }
                        info!(rules = texts.len(), category_id, "bulk rule upsert");
                    }
                }
            }
        }

        let mut next = self.with_state(state);
        next.selection.clear();
        Ok(next)
    }

    /// Turn an existing assignment into a rule for the transaction's text.
    pub fn derive_rule_from_categorized_transaction(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Ledger> {
        let entry = self.entry(id)?;
        let category_id = entry
            .category_id
            .as_deref()
            .ok_or(CategorizeError::MissingCategoryForRule(id))?;
        self.check_leaf(category_id)?;
        check_rule_text(&entry.transaction.text)?;

        info!(%id, text = %entry.transaction.text, category_id, "derive rule");
        let mut state = self.state.clone();
        state.rules = state.rules.set_rule(&entry.transaction.text, category_id, now);
        Ok(self.with_state(state))
    }

    /// Clear every assignment that points at a non-leaf category.
    ///
    /// Locked occurrences are unlocked; a rule whose target is no longer a
    /// leaf is deleted, which clears every transaction it matched. Returns
    /// the number of transactions repaired. A second run repairs nothing.
    pub fn fix_invalid_categorizations(&self) -> (Ledger, usize) {
        let mut state = self.state.clone();
        let mut repaired = 0usize;

        for c in self.categorized() {
            let Some(category_id) = c.category_id.as_deref() else {
                continue;
            };
            if self.registry.is_leaf(category_id) {
                continue;
            }
            repaired += 1;

            if c.is_locked {
                state.locks = state.locks.unlock(&c.fingerprint);
            }
            // Unlocking may expose a rule that is just as invalid.
            let key = c.normalized_text();
            let bad_rule = state
                .rules
                .get_rule(&key)
                .is_some_and(|r| !self.registry.is_leaf(&r.category_id));
            if bad_rule {
                state.rules = state.rules.delete_rule(&key);
            }
        }

        if repaired == 0 {
            return (self.clone(), 0);
        }
        info!(repaired, "repaired invalid category assignments");
        (self.with_state(state), repaired)
    }

    /// Swap in a new registry snapshot. Assignments are not revalidated;
    /// follow up with [`Ledger::fix_invalid_categorizations`].
    pub fn replace_registry(&self, registry: CategoryRegistry) -> Ledger {
        let mut next = self.clone();
        next.registry = Arc::new(registry);
        next
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    pub fn select(&self, id: TransactionId) -> Result<Ledger> {
        self.entry(id)?;
        let mut next = self.clone();
        next.selection.insert(id);
        Ok(next)
    }

    pub fn deselect(&self, id: TransactionId) -> Ledger {
        let mut next = self.clone();
        next.selection.remove(&id);
        next
    }

    pub fn clear_selection(&self) -> Ledger {
        let mut next = self.clone();
        next.selection.clear();
        next
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn entry(&self, id: TransactionId) -> Result<&CategorizedTransaction> {
        self.get(id).ok_or(CategorizeError::TransactionNotFound(id))
    }

    fn check_leaf(&self, category_id: &str) -> Result<()> {
        self.registry.validate_assignment(category_id).map_err(|reason| {
            warn!(category_id, %reason, "rejected category assignment");
            CategorizeError::InvalidCategoryAssignment {
                category_id: category_id.to_string(),
                reason,
            }
        })
    }

    fn with_state(&self, state: ClassifierState) -> Ledger {
        let mut next = self.clone();
        next.state = state;
        next.reclassify()
    }

    fn reclassify(mut self) -> Self {
        self.classification = Arc::new(classify(&self.transactions, &self.state));
        self
    }
}

/// A rule keyed on blank text would never match anything.
fn check_rule_text(text: &str) -> Result<()> {
    if normalize_text(text).is_empty() {
        warn!(text, "rejected blank rule text");
        return Err(CategorizeError::BlankRuleText(text.to_string()));
    }
    Ok(())
}

/// `(old ledger, action) -> new ledger`.
pub fn reduce(ledger: &Ledger, action: Action, now: DateTime<Utc>) -> Result<Ledger> {
    match action {
        Action::Import(txs) => Ok(ledger.import(txs).0),
        Action::SetRule { text, category_id } => ledger.set_rule(&text, &category_id, now),
        Action::DeleteRule { text } => Ok(ledger.delete_rule(&text)),
        Action::Lock {
            fingerprint,
            category_id,
            reason,
        } => ledger.lock(&fingerprint, &category_id, reason.as_deref(), now),
        Action::Unlock { fingerprint } => Ok(ledger.unlock(&fingerprint)),
        Action::Categorize {
            id,
            category_id,
            options,
        } => ledger.categorize(id, &category_id, &options, now),
        Action::BulkCategorize {
            ids,
            target,
            mode,
            reason,
        } => ledger.bulk_categorize(&ids, &target, mode, reason.as_deref(), now),
        Action::DeriveRule { id } => ledger.derive_rule_from_categorized_transaction(id, now),
        Action::FixInvalidCategorizations => Ok(ledger.fix_invalid_categorizations().0),
        Action::Select(id) => ledger.select(id),
        Action::Deselect(id) => Ok(ledger.deselect(id)),
        Action::ClearSelection => Ok(ledger.clear_selection()),
        Action::ReplaceRegistry(registry) => Ok(ledger.replace_registry(registry)),
    }
}
