//! tally-ingest: reads normalized transaction records into `tally_core::Transaction`.
//!
//! Bank-specific statement parsing happens upstream; this crate only accepts
//! the normalized CSV shape and never de-duplicates.

pub mod records;

pub use records::{read_transactions, read_transactions_from_reader};
