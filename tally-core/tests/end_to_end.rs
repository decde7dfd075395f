use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tally_core::{
    BulkMode, BulkTarget, CategorizationStatus, Category, CategoryRegistry, ClassificationStats,
    ClassifierState, Ledger, LockStore, RuleStore, Transaction, TransactionId, classify,
    fingerprint,
};

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, day, 10, 0, 0).unwrap()
}

fn tx(day: u32, amount: f64, text: &str) -> Transaction {
    Transaction::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), amount, text)
}

fn registry() -> CategoryRegistry {
    CategoryRegistry::from_categories(vec![
        Category::main("food", "Food"),
        Category::sub("cat_food", "Groceries", "food"),
        Category::main("home", "Home"),
        Category::sub("cat_home", "Household", "home"),
        Category::standalone("cat_salary", "Salary").income(),
    ])
}

/// KIWI/KIWI/REMA walkthrough: rule first, then a lock on one KIWI line.
#[test]
fn rule_then_lock_walkthrough() {
    let txs = vec![tx(1, -100.0, "KIWI"), tx(2, -50.0, "KIWI"), tx(3, -30.0, "REMA")];

    let rules = RuleStore::new().set_rule("kiwi", "cat_food", at(1));
    let state = ClassifierState::new(rules, LockStore::new());
    let out = classify(&txs, &state);

    assert_eq!(out.categorized[0].category_id.as_deref(), Some("cat_food"));
    assert_eq!(out.categorized[1].category_id.as_deref(), Some("cat_food"));
    assert_eq!(out.categorized[2].category_id, None);
    assert_eq!(
        out.stats,
        ClassificationStats {
            total: 3,
            categorized: 2,
            uncategorized: 1,
            locked: 0,
            rules_applied: 2,
        }
    );

    let locks = state
        .locks
        .clone()
        .lock(&fingerprint(&txs[0]), "cat_home", Some("gift card"), at(2));
    let state = ClassifierState::new(state.rules.clone(), locks);
    let out = classify(&txs, &state);

    assert_eq!(out.categorized[0].category_id.as_deref(), Some("cat_home"));
    assert!(out.categorized[0].is_locked);
    assert_eq!(out.categorized[1].category_id.as_deref(), Some("cat_food"));
    assert!(!out.categorized[1].is_locked);
    assert_eq!(out.stats.locked, 1);
    assert_eq!(out.stats.rules_applied, 1);
}

#[test]
fn no_rule_change_moves_a_locked_transaction() {
    let ledger = Ledger::new(registry(), ClassifierState::default())
        .with_transactions(vec![tx(1, -100.0, "KIWI"), tx(2, -50.0, "KIWI")])
        .bulk_categorize(
            &[TransactionId(0)],
            &BulkTarget::Category("cat_home".into()),
            BulkMode::LockAsException,
            None,
            at(1),
        )
        .unwrap();

    let ledger = ledger.set_rule("KIWI", "cat_food", at(2)).unwrap();
    assert_eq!(ledger.get(TransactionId(0)).unwrap().category_id.as_deref(), Some("cat_home"));

    let ledger = ledger.set_rule("kiwi", "cat_salary", at(3)).unwrap();
    assert_eq!(ledger.get(TransactionId(0)).unwrap().category_id.as_deref(), Some("cat_home"));
    assert_eq!(ledger.get(TransactionId(1)).unwrap().category_id.as_deref(), Some("cat_salary"));

    let ledger = ledger.delete_rule("kiwi");
    assert_eq!(ledger.get(TransactionId(0)).unwrap().status(), CategorizationStatus::Locked);
    assert_eq!(ledger.get(TransactionId(1)).unwrap().status(), CategorizationStatus::Uncategorized);
}

#[test]
fn unlocking_one_of_many_identical_texts() {
    let txs: Vec<_> = (1..=5).map(|d| tx(d, -25.0, "VINMONOPOLET")).collect();
    let ids: Vec<_> = (0..5).map(TransactionId).collect();

    let ledger = Ledger::new(registry(), ClassifierState::default())
        .with_transactions(txs)
        .set_rule("vinmonopolet", "cat_food", at(1))
        .unwrap()
        .bulk_categorize(
            &ids,
            &BulkTarget::Category("cat_home".into()),
            BulkMode::LockAsException,
            Some("party"),
            at(2),
        )
        .unwrap();
    assert_eq!(ledger.stats().locked, 5);

    let ledger = ledger.unlock_transaction(TransactionId(2)).unwrap();
    assert_eq!(ledger.stats().locked, 4);
    assert_eq!(ledger.get(TransactionId(2)).unwrap().status(), CategorizationStatus::RuleMatched);
    assert_eq!(ledger.get(TransactionId(2)).unwrap().category_id.as_deref(), Some("cat_food"));

    let pattern = ledger.pattern_stats();
    assert_eq!(pattern.unique_text_patterns, 1);
    assert_eq!(pattern.patterns_with_rules, 1);
}

#[test]
fn reclassify_after_each_step_matches_a_fresh_classify() {
    let (ledger, _) = Ledger::new(registry(), ClassifierState::default())
        .import(vec![tx(1, -100.0, "KIWI"), tx(3, -30.0, "REMA")]);
    let ledger = ledger.set_rule("rema", "cat_food", at(1)).unwrap();

    let fresh = classify(ledger.transactions(), ledger.state());
    assert_eq!(fresh.categorized, ledger.categorized());
    assert_eq!(fresh.stats, ledger.stats());
}
