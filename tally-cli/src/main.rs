use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod init;
mod state;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Categorize bank-statement transactions with rules and locks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write default config.toml and categories.toml under ~/.tally
    Init,

    /// Import a normalized transaction CSV, skipping already-known transactions
    Import {
        #[arg(long)]
        csv: PathBuf,
    },

    /// Classify a CSV against the saved rules/locks without importing it
    Classify {
        #[arg(long)]
        csv: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List known transactions with their categories
    List {
        /// Only show uncategorized transactions
        #[arg(long)]
        uncategorized: bool,

        /// Limit number of rows printed
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print classification and pattern stats
    Stats,

    /// Rule CRUD
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Lock (manual exception) CRUD
    Locks {
        #[command(subcommand)]
        command: LocksCommand,
    },

    /// Categorize one transaction
    Categorize {
        id: usize,
        category: String,

        /// Create a rule for the transaction text (affects every matching transaction)
        #[arg(long)]
        rule: bool,

        /// Reason stored with the lock when --rule is not given
        #[arg(long)]
        reason: Option<String>,
    },

    /// Categorize many transactions at once
    Bulk {
        #[arg(required = true)]
        ids: Vec<usize>,

        /// Target category
        #[arg(long, conflicts_with = "uncategorize", required_unless_present = "uncategorize")]
        category: Option<String>,

        /// Unlock the selected transactions instead of assigning
        #[arg(long)]
        uncategorize: bool,

        #[arg(long, value_enum, default_value_t = BulkModeArg::Lock)]
        mode: BulkModeArg,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Create a rule from a transaction's current category
    DeriveRule { id: usize },

    /// Clear assignments that point at non-leaf categories
    Repair,

    /// Inspect the persisted rule/lock snapshot
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Create or update the rule for TEXT
    Set { text: String, category: String },
    Delete { text: String },
    Get { text: String },
    List,
}

#[derive(Subcommand, Debug)]
enum LocksCommand {
    /// Pin transaction ID to CATEGORY
    Add {
        id: usize,
        category: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Remove { id: usize },
    Get { id: usize },
    List,
}

#[derive(Subcommand, Debug)]
enum SnapshotCommand {
    /// Check a snapshot file (defaults to the saved state)
    Validate {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the saved snapshot as JSON
    Show,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BulkModeArg {
    /// Lock every selected occurrence
    Lock,
    /// One rule per distinct text
    Rule,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let home = state::tally_home()?;
    let cfg = config::load_config(&home)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Init => init::run_init(),
        // Must work even when the saved state is what's broken.
        Command::Snapshot {
            command: SnapshotCommand::Validate { file },
        } => commands::validate_snapshot_file(&home, &cfg, file),
        command => run(state::Workspace::open(state::ensure_tally_home()?, cfg)?, command),
    }
}

fn run(ws: state::Workspace, command: Command) -> Result<()> {
    match command {
        Command::Init => init::run_init()?,
        Command::Import { csv } => commands::import(&ws, &csv)?,
        Command::Classify { csv, json } => commands::classify_file(&ws, &csv, json)?,
        Command::List {
            uncategorized,
            limit,
        } => commands::list(&ws, uncategorized, limit),
        Command::Stats => commands::stats(&ws),

        Command::Rules { command } => match command {
            RulesCommand::Set { text, category } => commands::set_rule(&ws, &text, &category)?,
            RulesCommand::Delete { text } => commands::delete_rule(&ws, &text)?,
            RulesCommand::Get { text } => commands::get_rule(&ws, &text),
            RulesCommand::List => commands::list_rules(&ws),
        },

        Command::Locks { command } => match command {
            LocksCommand::Add {
                id,
                category,
                reason,
            } => commands::lock(&ws, id, &category, reason.as_deref())?,
            LocksCommand::Remove { id } => commands::unlock(&ws, id)?,
            LocksCommand::Get { id } => commands::get_lock(&ws, id)?,
            LocksCommand::List => commands::list_locks(&ws),
        },

        Command::Categorize {
            id,
            category,
            rule,
            reason,
        } => commands::categorize(&ws, id, &category, rule, reason)?,

        Command::Bulk {
            ids,
            category,
            uncategorize: _,
            mode,
            reason,
        } => {
            let mode = match mode {
                BulkModeArg::Lock => tally_core::BulkMode::LockAsException,
                BulkModeArg::Rule => tally_core::BulkMode::CreateRule,
            };
            let target = match category {
                Some(c) => tally_core::BulkTarget::Category(c),
                None => tally_core::BulkTarget::Uncategorize,
            };
            commands::bulk(&ws, &ids, &target, mode, reason.as_deref())?
        }

        Command::DeriveRule { id } => commands::derive_rule(&ws, id)?,
        Command::Repair => commands::repair(&ws)?,

        Command::Snapshot { command } => match command {
            SnapshotCommand::Validate { file } => {
                commands::validate_snapshot_file(&ws.home, &ws.config, file)?
            }
            SnapshotCommand::Show => commands::show_snapshot(&ws)?,
        },
    }

    Ok(())
}
