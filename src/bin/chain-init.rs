#![forbid(unsafe_code)]
//! Initializes a ledger from an external chain configuration

use chainspec::config::load_config;
use chainspec::external::read_chain_config_from_json_file;
use chainspec::genesis::{make_genesis_dump, write_genesis_block};
use chainspec::persistence::Database;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Writes the genesis block of a chain configuration into the database
    Init {
        /// Chain configuration file, overrides chain.config_path
        #[arg(long)]
        chain: Option<PathBuf>,
    },
    /// Prints the genesis dump of the database as JSON
    DumpGenesis,
    /// Prints the options in effect at a block height
    Options {
        block: u64,
        #[arg(long)]
        chain: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let chain_path = |arg: &Option<PathBuf>| {
        arg.clone()
            .unwrap_or_else(|| PathBuf::from(&config.chain.config_path))
    };

    match &cli.command {
        Commands::Init { chain } => {
            let external = read_chain_config_from_json_file(chain_path(chain))?;
            let db = open_database(&config.database.path)?;
            let block = write_genesis_block(&db, external.genesis()?)?;
            info!(network = %external.name, "Chain initialized");
            println!("0x{}", hex::encode(block.hash()));
        }
        Commands::DumpGenesis => {
            let db = open_database(&config.database.path)?;
            match make_genesis_dump(&db)? {
                Some(dump) => println!("{}", serde_json::to_string_pretty(&dump)?),
                None => return Err("no genesis block in database".into()),
            }
        }
        Commands::Options { block, chain } => {
            let external = read_chain_config_from_json_file(chain_path(chain))?;
            let chain_config = external.chain_config()?;
            let options = chain_config.options(*block)?;
            println!("{}", serde_json::to_string_pretty(&options)?);
            println!("explosion: {}", chain_config.is_explosion(*block)?);
        }
    }

    Ok(())
}

fn open_database(path: &str) -> Result<Database, Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir {:?}: {}", parent, e))?;
        }
    }
    Ok(Database::open(path)?)
}
