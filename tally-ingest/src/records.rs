//! Normalized transaction CSV.
//!
//! Header row required:
//!   date,amount,type,text,from_account,to_account
//!
//! `date` is YYYY-MM-DD, `amount` a plain decimal (negative = money out).
//! The two account columns may be blank or missing.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tally_core::Transaction;

/// Parse every row of a normalized CSV file.
pub fn read_transactions(path: impl AsRef<Path>) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_transactions_from_reader(file).with_context(|| format!("parsing {}", path.display()))
}

pub fn read_transactions_from_reader<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<Transaction>().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let tx = row.with_context(|| format!("line {}", i + 2))?;
        out.push(tx);
    }
    Ok(out)
}
