//! plate_admin - allow-list and access log administration
//!
//! Operates directly on the plate_gated database (db_path from the usual
//! configuration, or `--db`).

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use plate_gate::{AccessStore, GateConfig, SqliteAccessStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Database path (overrides PLATE_GATE_CONFIG / PLATE_GATE_DB_PATH).
    #[arg(long)]
    db: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a plate to the allow-list.
    Add {
        plate: String,
        /// Owner name shown on decisions.
        #[arg(long)]
        owner: String,
    },
    /// Remove a plate from the allow-list.
    Revoke { plate: String },
    /// List allowed plates as JSON lines.
    Plates,
    /// List recent access decisions, newest first, as JSON lines.
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show the most recent access decision.
    Latest,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => GateConfig::load()?.db_path,
    };
    let mut store = SqliteAccessStore::open(&db_path)?;

    match cli.command {
        Command::Add { plate, owner } => {
            let added = store.allow_plate(&plate, &owner)?;
            println!("added {} for {}", added.plate, added.owner);
        }
        Command::Revoke { plate } => {
            if !store.revoke_plate(&plate)? {
                return Err(anyhow!("plate {} is not on the allow-list", plate));
            }
            println!("revoked {}", plate);
        }
        Command::Plates => {
            for entry in store.allowed_plates()? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Command::Logs { limit } => {
            for entry in store.recent_decisions(limit)? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Command::Latest => match store.latest_decision()? {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => println!("no decisions recorded"),
        },
    }
    Ok(())
}
