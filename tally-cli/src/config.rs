use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Rule/lock snapshot (JSON), relative to the tally home.
    pub state_file: String,
    /// Known transactions (JSON), used for re-import de-duplication.
    pub transactions_file: String,
    /// Category registry (TOML).
    pub categories_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` filter used when RUST_LOG is unset.
    pub level: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            state_file: "state.json".to_string(),
            transactions_file: "transactions.json".to_string(),
            categories_file: "categories.toml".to_string(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl StorageSection {
    pub fn state_path(&self, home: &Path) -> PathBuf {
        home.join(&self.state_file)
    }

    pub fn transactions_path(&self, home: &Path) -> PathBuf {
        home.join(&self.transactions_file)
    }

    pub fn categories_path(&self, home: &Path) -> PathBuf {
        home.join(&self.categories_file)
    }
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

pub fn load_config(home: &Path) -> Result<Config> {
    let p = config_path(home);
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(home: &Path, cfg: &Config) -> Result<()> {
    let p = config_path(home);
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    write_atomic(&p, &s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: Config = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.storage, StorageSection::default());
    }

    #[test]
    fn default_round_trips_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back, Config::default());
    }

    #[test]
    fn saved_config_loads_back_without_temp_file() {
        let home = std::env::temp_dir().join(format!("tally-config-{}", std::process::id()));
        fs::create_dir_all(&home).unwrap();
        let mut cfg = Config::default();
        cfg.logging.level = "info".to_string();

        save_config(&home, &cfg).unwrap();
        assert_eq!(load_config(&home).unwrap(), cfg);
        assert!(!config_path(&home).with_extension("tmp").exists());
    }
}
