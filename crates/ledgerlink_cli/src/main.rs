//! Ledgerlink CLI
//!
//! Command-line client for Ledgerlink validators.
//!
//! # Commands
//!
//! - `status` - Show validator status
//! - `stores`, `store` - List stores, query a store
//! - `blocks`, `block` - List blocks, show a block
//! - `transactions`, `transaction`, `txn-status` - Inspect transactions
//! - `keygen` - Generate a signing key
//! - `submit` - Sign and submit a transaction
//! - `wait` - Wait for a transaction to commit

mod commands;

use clap::{Parser, Subcommand};
use commands::submit::FamilyKind;
use ledgerlink_client::ClientConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ledgerlink command-line client.
#[derive(Parser)]
#[command(name = "ledgerlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Validator base URL
    #[arg(global = true, short, long, default_value = "http://localhost:8800")]
    url: String,

    /// Store to operate on
    #[arg(global = true, short, long)]
    store: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show validator status
    Status,

    /// List stores
    Stores,

    /// List recent block ids, newest first
    Blocks {
        /// Number of blocks
        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Show a block
    Block {
        /// Block id
        id: String,

        /// Show only this field
        #[arg(short, long)]
        field: Option<String>,
    },

    /// List transaction ids in recent blocks
    Transactions {
        /// Number of blocks to look back
        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Show a transaction
    Transaction {
        /// Transaction id
        id: String,

        /// Show only this field
        #[arg(short, long)]
        field: Option<String>,
    },

    /// Show the commit status of a transaction
    TxnStatus {
        /// Transaction id
        id: String,
    },

    /// Query the store selected with --store
    Store {
        /// Object key, or `*` for every object
        #[arg(short, long)]
        key: Option<String>,

        /// Query as of this block
        #[arg(short, long)]
        block: Option<String>,

        /// Show only the block's changes (requires --key)
        #[arg(short, long)]
        delta: bool,
    },

    /// Generate a signing key
    Keygen {
        /// Write the key to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Sign and submit a transaction
    Submit {
        /// File holding the hex-encoded signing key
        #[arg(short, long)]
        key_file: PathBuf,

        /// Update record as JSON (repeat for several)
        #[arg(long = "update", required = true)]
        updates: Vec<String>,

        /// Transaction this one depends on (repeatable)
        #[arg(short, long = "dependency")]
        dependencies: Vec<String>,

        /// Transaction family
        #[arg(long, value_enum, default_value = "integer-key")]
        family: FamilyKind,

        /// Type name for the generic family
        #[arg(long, required_if_eq("family", "generic"))]
        type_name: Option<String>,

        /// Message type for the generic family
        #[arg(long, required_if_eq("family", "generic"))]
        message_type: Option<String>,

        /// Skip the local validity check
        #[arg(long)]
        no_validate: bool,

        /// Wait for the transaction to commit
        #[arg(short, long)]
        wait: bool,
    },

    /// Wait for a transaction to commit
    Wait {
        /// Transaction id
        id: String,

        /// Seconds between status checks
        #[arg(short, long, default_value = "5")]
        interval: f64,

        /// Status checks after the first
        #[arg(short, long, default_value = "12")]
        polls: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig::new(cli.url);
    if let Some(store) = cli.store {
        config = config.with_store_name(store);
    }

    match cli.command {
        Commands::Status => commands::read::status(config)?,
        Commands::Stores => commands::read::stores(config)?,
        Commands::Blocks { count } => commands::read::blocks(config, count)?,
        Commands::Block { id, field } => commands::read::block(config, &id, field.as_deref())?,
        Commands::Transactions { count } => commands::read::transactions(config, count)?,
        Commands::Transaction { id, field } => {
            commands::read::transaction(config, &id, field.as_deref())?
        }
        Commands::TxnStatus { id } => commands::read::txn_status(config, &id)?,
        Commands::Store { key, block, delta } => {
            commands::read::store(config, key.as_deref(), block.as_deref(), delta)?
        }
        Commands::Keygen { out } => commands::keygen::run(out.as_deref())?,
        Commands::Submit {
            key_file,
            updates,
            dependencies,
            family,
            type_name,
            message_type,
            no_validate,
            wait,
        } => {
            let family = commands::submit::family(family, type_name, message_type)?;
            let options = commands::submit::SubmitOptions {
                key_file,
                updates,
                dependencies,
                validate: !no_validate,
                wait,
            };
            commands::submit::run(config, family, options)?
        }
        Commands::Wait {
            id,
            interval,
            polls,
        } => commands::wait::run(config, &id, interval, polls)?,
    }

    Ok(())
}
