//! Command handlers: call into the ledger, persist, print.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tally_core::{
    BulkMode, BulkTarget, CategorizeOptions, CategorizedTransaction, CategoryRegistry, Ledger,
    Snapshot, TransactionId, classify,
};
use tally_ingest::read_transactions;

use crate::config::Config;
use crate::state::Workspace;

pub fn import(ws: &Workspace, csv: &Path) -> Result<()> {
    if !csv.exists() {
        bail!("CSV not found: {} (pass --csv <path>)", csv.display());
    }
    let txns = read_transactions(csv)?;
    let parsed = txns.len();
    let (ledger, summary) = ws.ledger.import(txns);
    ws.save_all(&ledger)?;

    println!("Parsed {} transactions from {}", parsed, csv.display());
    println!(
        "Added {} (skipped {} already known)",
        summary.added, summary.duplicates
    );
    print_stats(&ledger);
    Ok(())
}

pub fn classify_file(ws: &Workspace, csv: &Path, json: bool) -> Result<()> {
    let txns = read_transactions(csv)?;
    let out = classify(&txns, ws.ledger.state());
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    for c in &out.categorized {
        print_row(c, ws.ledger.registry());
    }
    let s = out.stats;
    println!(
        "\ntotal={} categorized={} uncategorized={} locked={} rules_applied={}",
        s.total, s.categorized, s.uncategorized, s.locked, s.rules_applied
    );
    Ok(())
}

pub fn list(ws: &Workspace, uncategorized: bool, limit: Option<usize>) {
    let rows: Box<dyn Iterator<Item = &CategorizedTransaction> + '_> = if uncategorized {
        Box::new(ws.ledger.uncategorized())
    } else {
        Box::new(ws.ledger.categorized().iter())
    };
    for c in rows.take(limit.unwrap_or(usize::MAX)) {
        print_row(c, ws.ledger.registry());
    }
}

pub fn stats(ws: &Workspace) {
    print_stats(&ws.ledger);
}

// -------------------------------------------------------------------------
// Rules
// -------------------------------------------------------------------------

pub fn set_rule(ws: &Workspace, text: &str, category: &str) -> Result<()> {
    let ledger = ws.ledger.set_rule(text, category, Utc::now())?;
    ws.save_state(&ledger)?;
    println!("Rule '{}' -> {}", text.trim().to_lowercase(), display(ws, category));
    print_stats(&ledger);
    Ok(())
}

pub fn delete_rule(ws: &Workspace, text: &str) -> Result<()> {
    if ws.ledger.rules().get_rule(text).is_none() {
        bail!("no rule for '{}'", text);
    }
    let ledger = ws.ledger.delete_rule(text);
    ws.save_state(&ledger)?;
    println!("Deleted rule '{}'", text.trim().to_lowercase());
    print_stats(&ledger);
    Ok(())
}

pub fn get_rule(ws: &Workspace, text: &str) {
    match ws.ledger.rules().get_rule(text) {
        Some(r) => println!(
            "{} -> {} (created {}, updated {})",
            r.normalized_text,
            display(ws, &r.category_id),
            r.created_at.to_rfc3339(),
            r.updated_at.to_rfc3339()
        ),
        None => println!("no rule for '{}'", text),
    }
}

pub fn list_rules(ws: &Workspace) {
    let rules = ws.ledger.rules().list_rules();
    if rules.is_empty() {
        println!("(no rules)");
    }
    for r in rules {
        println!("{:<40} {}", r.normalized_text, display(ws, &r.category_id));
    }
}

// -------------------------------------------------------------------------
// Locks
// -------------------------------------------------------------------------

pub fn lock(ws: &Workspace, id: usize, category: &str, reason: Option<&str>) -> Result<()> {
    let fingerprint = fingerprint_of(&ws.ledger, id)?;
    let ledger = ws.ledger.lock(&fingerprint, category, reason, Utc::now())?;
    ws.save_state(&ledger)?;
    println!("Locked {} -> {}", TransactionId(id), display(ws, category));
    Ok(())
}

pub fn unlock(ws: &Workspace, id: usize) -> Result<()> {
    let fingerprint = fingerprint_of(&ws.ledger, id)?;
    if !ws.ledger.locks().is_locked(&fingerprint) {
        bail!("{} is not locked", TransactionId(id));
    }
    let ledger = ws.ledger.unlock(&fingerprint);
    ws.save_state(&ledger)?;
    let now = ledger
        .get(TransactionId(id))
        .and_then(|c| c.category_id.as_deref())
        .map(|c| display(ws, c))
        .unwrap_or_else(|| "(uncategorized)".to_string());
    println!("Unlocked {}; now {}", TransactionId(id), now);
    Ok(())
}

pub fn get_lock(ws: &Workspace, id: usize) -> Result<()> {
    let fingerprint = fingerprint_of(&ws.ledger, id)?;
    match ws.ledger.locks().get_lock(&fingerprint) {
        Some(l) => println!(
            "{} {} -> {} (locked {}){}",
            TransactionId(id),
            l.fingerprint,
            display(ws, &l.category_id),
            l.locked_at.to_rfc3339(),
            l.reason.as_deref().map(|r| format!(" reason: {r}")).unwrap_or_default()
        ),
        None => println!("{} is not locked", TransactionId(id)),
    }
    Ok(())
}

pub fn list_locks(ws: &Workspace) {
    let locks = ws.ledger.locks().list_locks();
    if locks.is_empty() {
        println!("(no locks)");
    }
    for l in locks {
        println!(
            "{} {:<30} {}",
            l.fingerprint,
            display(ws, &l.category_id),
            l.reason.as_deref().unwrap_or("")
        );
    }
}

// -------------------------------------------------------------------------
// Workflows
// -------------------------------------------------------------------------

pub fn categorize(
    ws: &Workspace,
    id: usize,
    category: &str,
    rule: bool,
    reason: Option<String>,
) -> Result<()> {
    let options = CategorizeOptions {
        create_rule: rule,
        reason,
    };
    let ledger = ws
        .ledger
        .categorize(TransactionId(id), category, &options, Utc::now())?;
    ws.save_state(&ledger)?;
    println!("{} -> {}", TransactionId(id), display(ws, category));
    print_stats(&ledger);
    Ok(())
}

pub fn bulk(
    ws: &Workspace,
    ids: &[usize],
    target: &BulkTarget,
    mode: BulkMode,
    reason: Option<&str>,
) -> Result<()> {
    let ids: Vec<TransactionId> = ids.iter().copied().map(TransactionId).collect();
    let ledger = ws
        .ledger
        .bulk_categorize(&ids, target, mode, reason, Utc::now())?;
    ws.save_state(&ledger)?;
    match target {
        BulkTarget::Uncategorize => println!("Unlocked {} transactions", ids.len()),
        BulkTarget::Category(c) => println!("{} transactions -> {}", ids.len(), display(ws, c)),
    }
    print_stats(&ledger);
    Ok(())
}

pub fn derive_rule(ws: &Workspace, id: usize) -> Result<()> {
    let ledger = ws
        .ledger
        .derive_rule_from_categorized_transaction(TransactionId(id), Utc::now())?;
    ws.save_state(&ledger)?;
    if let Some(c) = ledger.get(TransactionId(id)) {
        println!("Rule '{}' created from {}", c.normalized_text(), TransactionId(id));
    }
    print_stats(&ledger);
    Ok(())
}

pub fn repair(ws: &Workspace) -> Result<()> {
    let (ledger, repaired) = ws.ledger.fix_invalid_categorizations();
    if repaired > 0 {
        ws.save_state(&ledger)?;
    }
    println!("Repaired {} invalid assignments", repaired);
    Ok(())
}

// -------------------------------------------------------------------------
// Snapshot
// -------------------------------------------------------------------------

pub fn validate_snapshot_file(home: &Path, config: &Config, file: Option<PathBuf>) -> Result<()> {
    let path = file.unwrap_or_else(|| config.storage.state_path(home));
    let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    let snapshot = Snapshot::from_value(value)
        .with_context(|| format!("{}: invalid snapshot", path.display()))?;
    println!(
        "{}: ok ({} rules, {} locks)",
        path.display(),
        snapshot.rules.len(),
        snapshot.locks.len()
    );
    Ok(())
}

pub fn show_snapshot(ws: &Workspace) -> Result<()> {
    println!("{}", Snapshot::from_state(ws.ledger.state()).to_json()?);
    Ok(())
}

// -------------------------------------------------------------------------
// Output helpers
// -------------------------------------------------------------------------

fn fingerprint_of(ledger: &Ledger, id: usize) -> Result<String> {
    ledger
        .get(TransactionId(id))
        .map(|c| c.fingerprint.clone())
        .with_context(|| format!("transaction {} not found", TransactionId(id)))
}

fn display(ws: &Workspace, category_id: &str) -> String {
    ws.ledger.registry().display_name(category_id)
}

fn print_row(c: &CategorizedTransaction, registry: &CategoryRegistry) {
    let category = c
        .category_id
        .as_deref()
        .map(|id| registry.display_name(id))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>6} {} {:>12.2} {:<40} {}{}",
        c.id.to_string(),
        c.transaction.date,
        c.transaction.amount,
        c.transaction.text,
        category,
        if c.is_locked { " [locked]" } else { "" }
    );
}

fn print_stats(ledger: &Ledger) {
    let s = ledger.stats();
    let p = ledger.pattern_stats();
    println!(
        "total={} categorized={} uncategorized={} locked={} rules_applied={}",
        s.total, s.categorized, s.uncategorized, s.locked, s.rules_applied
    );
    println!(
        "patterns={} with_rules={}",
        p.unique_text_patterns, p.patterns_with_rules
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{Category, ClassifierState, Transaction};

    #[test]
    fn fingerprint_lookup_reports_missing_ids() {
        let ledger = Ledger::new(
            CategoryRegistry::from_categories(vec![Category::standalone("gifts", "Gifts")]),
            ClassifierState::default(),
        )
        .with_transactions(vec![Transaction::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            -10.0,
            "KAFFE",
        )]);
        assert_eq!(fingerprint_of(&ledger, 0).unwrap().len(), 32);
        let err = fingerprint_of(&ledger, 5).unwrap_err();
        assert!(err.to_string().contains("#5"));
    }
}
