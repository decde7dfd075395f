//! tally-core: categorization engine for bank-statement transactions.
//!
//! Rules map normalized text to a category; locks pin one transaction
//! occurrence (by fingerprint) to a category and always win over rules.
//! `classify` recomputes the full categorized view from those two stores,
//! and the `Ledger` workflows mutate them and reclassify.

pub mod category;
pub mod classify;
pub mod error;
pub mod locks;
pub mod rules;
pub mod snapshot;
pub mod transaction;
pub mod workflow;

pub use category::{Category, CategoryRegistry, LeafViolation};
pub use classify::{
    CategorizationStatus, CategorizedTransaction, Classification, ClassificationStats,
    ClassifierState, PatternStats, classify, pattern_stats,
};
pub use error::{CategorizeError, Result};
pub use locks::{LockStore, TransactionLock};
pub use rules::{CategoryRule, RuleStore};
pub use snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotError, validate_snapshot};
pub use transaction::{Transaction, TransactionId, fingerprint, normalize_text};
pub use workflow::{
    Action, BulkMode, BulkTarget, CategorizeOptions, ImportSummary, Ledger, reduce,
};
