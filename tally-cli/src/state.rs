//! On-disk state under the tally home: snapshot, known transactions and
//! the category registry. This is the only place the CLI touches files.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tally_core::{
    Category, CategoryRegistry, ClassifierState, Ledger, Snapshot, Transaction, validate_snapshot,
};
use tracing::debug;

use crate::config::Config;

pub fn tally_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".tally"))
}

pub fn ensure_tally_home() -> Result<PathBuf> {
    let dir = tally_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// `categories.toml` layout: a list of `[[category]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryFile {
    #[serde(default, rename = "category")]
    pub categories: Vec<Category>,
}

pub fn read_state(path: &Path) -> Result<ClassifierState> {
    if !path.exists() {
        return Ok(ClassifierState::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    if !validate_snapshot(&value) {
        bail!(
            "{} is not a valid snapshot; fix or remove it before continuing",
            path.display()
        );
    }
    let snapshot = Snapshot::from_value(value).with_context(|| format!("load {}", path.display()))?;
    Ok(snapshot.into_state())
}

pub fn write_state(path: &Path, state: &ClassifierState) -> Result<()> {
    let json = Snapshot::from_state(state).to_json()?;
    write_atomic(path, &json)
}

pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn write_transactions(path: &Path, txns: &[Transaction]) -> Result<()> {
    let json = serde_json::to_string_pretty(txns)?;
    write_atomic(path, &json)
}

pub fn read_registry(path: &Path) -> Result<CategoryRegistry> {
    if !path.exists() {
        return Ok(CategoryRegistry::new());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: CategoryFile =
        toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(CategoryRegistry::from_categories(file.categories))
}

pub fn write_registry(path: &Path, file: &CategoryFile) -> Result<()> {
    let s = toml::to_string_pretty(file).context("serialize categories")?;
    write_atomic(path, &s)
}

/// Write to a sibling temp file, then rename over the target.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Loaded home directory plus the ledger rebuilt from it.
pub struct Workspace {
    pub home: PathBuf,
    pub config: Config,
    pub ledger: Ledger,
}

impl Workspace {
    pub fn open(home: PathBuf, config: Config) -> Result<Self> {
        let storage = &config.storage;
        let registry = read_registry(&storage.categories_path(&home))?;
        let state = read_state(&storage.state_path(&home))?;
        let txns = read_transactions(&storage.transactions_path(&home))?;
        debug!(
            categories = registry.len(),
            rules = state.rules.len(),
            locks = state.locks.len(),
            transactions = txns.len(),
            "workspace loaded"
        );
        let ledger = Ledger::new(registry, state).with_transactions(txns);
        Ok(Self {
            home,
            config,
            ledger,
        })
    }

    /// Persist rule/lock state only.
    pub fn save_state(&self, ledger: &Ledger) -> Result<()> {
        write_state(&self.config.storage.state_path(&self.home), ledger.state())
    }

    /// Persist rule/lock state and the transaction list.
    pub fn save_all(&self, ledger: &Ledger) -> Result<()> {
        self.save_state(ledger)?;
        write_transactions(
            &self.config.storage.transactions_path(&self.home),
            ledger.transactions(),
        )
    }
}
