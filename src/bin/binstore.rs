//! binstore CLI
//!
//! Inspects and edits a persistent store from the command line.

use std::process::ExitCode;
use std::sync::Arc;

use binstore::{BinaryStore, BinaryStoreManager, DatabaseFactoryManager, StoreManagerConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// binstore CLI
#[derive(Parser, Debug)]
#[command(name = "binstore")]
#[command(about = "Inspect and edit persistent binstore stores")]
#[command(version)]
struct Args {
    /// Environment directory
    #[arg(short, long, default_value = "./binstore/lmdb")]
    dir: String,

    /// Store name
    #[arg(short, long)]
    name: String,

    /// Engine tuning parameter, e.g. lmdb.map_size=1073741824
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Put a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List every key
    Keys,

    /// Delete every entry
    Clear,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,binstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("binstore v{}", binstore::VERSION);
    tracing::info!("Environment directory: {}", args.dir);

    let config = StoreManagerConfig::builder()
        .parent_dir(&args.dir)
        .params(args.params.iter().cloned())
        .build();

    let factories = Arc::new(DatabaseFactoryManager::new());
    let manager = BinaryStoreManager::new(Arc::clone(&factories));

    let store = match manager.create_store(Some(&args.name), &config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store \"{}\": {}", args.name, e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&store, &args.command);
    manager.destroy_store(store);
    factories.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(store: &BinaryStore, command: &Commands) -> binstore::Result<()> {
    match command {
        Commands::Get { key } => match store.load(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            store.store(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            store.erase(key.as_bytes())?;
            println!("OK");
        }
        Commands::Keys => {
            for key in store.keys()? {
                println!("{}", String::from_utf8_lossy(&key?));
            }
        }
        Commands::Clear => {
            store.erase_all()?;
            println!("OK");
        }
    }
    Ok(())
}

/// Parse a `key=value` tuning pair
fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got \"{}\"", raw))
}
