use thiserror::Error;

use crate::category::LeafViolation;
use crate::transaction::TransactionId;

/// Rejections raised by the mutation workflows. All of them leave the
/// ledger exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategorizeError {
    #[error("transaction {id} is locked; unlock it before recategorizing")]
    LockedTransaction { id: TransactionId, fingerprint: String },

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("cannot assign to category '{category_id}': {reason}")]
    InvalidCategoryAssignment {
        category_id: String,
        reason: LeafViolation,
    },

    #[error("transaction {0} has no category to derive a rule from")]
    MissingCategoryForRule(TransactionId),

    #[error("rule text '{0}' is blank after normalization")]
    BlankRuleText(String),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, CategorizeError>;
