//! Transaction records and their content fingerprint.
//!
//! A `Transaction` is handed to us by the ingestion layer and never changes
//! afterwards. Its identity for duplicate detection, locks and re-imports is
//! the fingerprint, never the position it happens to occupy in a list.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Field separator for the fingerprint preimage (ASCII unit separator).
const FIELD_SEP: char = '\u{1f}';

/// One statement line, already normalized for date/amount format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    /// Negative = money out, positive = money in.
    pub amount: f64,
    /// Bank-provided transaction type ("Varekjøp", "Overføring", ...).
    #[serde(rename = "type")]
    pub transaction_type: String,
    /// Free-text description as printed on the statement.
    pub text: String,
    #[serde(default)]
    pub from_account: String,
    #[serde(default)]
    pub to_account: String,
}

impl Transaction {
    pub fn new(date: NaiveDate, amount: f64, text: impl Into<String>) -> Self {
        Self {
            date,
            amount,
            transaction_type: String::new(),
            text: text.into(),
            from_account: String::new(),
            to_account: String::new(),
        }
    }

    pub fn with_type(mut self, transaction_type: impl Into<String>) -> Self {
        self.transaction_type = transaction_type.into();
        self
    }

    pub fn with_accounts(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_account = from.into();
        self.to_account = to.into();
        self
    }

    /// Rule lookup key for this transaction's text.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }
}

/// Surrogate list key for a transaction within one ledger session.
///
/// Only meaningful to UI lists and selection; rules and locks never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub usize);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trim + lowercase. Two texts share a rule iff their normalized forms match.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Deterministic identity of a transaction.
///
/// Hashes (date, amount, type, text, from, to) in that order. Amounts are
/// rendered with two decimals and `-0.00` folds into `0.00`, so re-parsing
/// the same statement line always lands on the same string.
pub fn fingerprint(tx: &Transaction) -> String {
    let amount = if tx.amount == 0.0 { 0.0 } else { tx.amount };
    let preimage = [
        tx.date.format("%Y-%m-%d").to_string(),
        format!("{:.2}", amount),
        tx.transaction_type.clone(),
        tx.text.clone(),
        tx.from_account.clone(),
        tx.to_account.clone(),
    ]
    .join(&FIELD_SEP.to_string());

    let mut hasher = Sha256::new();
    hasher.update(preimage.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
