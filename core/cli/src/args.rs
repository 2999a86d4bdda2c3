use std::path::PathBuf;

use car_block_reader::requester::{ByteRange, DagScope};
use cid::Cid;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::config::CAR_READER_HOME_DIR;

#[derive(Parser)]
#[command(about, name = "car-reader", version)]
pub struct Args {
    /// Path to the toml configuration file
    #[arg(short, long, global = true, default_value_t = String::from(CAR_READER_HOME_DIR.join("config.toml").to_string_lossy().as_ref()) )]
    pub config: String,
    /// Increases the level of verbosity (the max level is -vvv).
    #[arg(short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ScopeArg {
    All,
    #[default]
    Entity,
    Block,
}

impl From<ScopeArg> for DagScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::All => DagScope::All,
            ScopeArg::Entity => DagScope::Entity,
            ScopeArg::Block => DagScope::Block,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// List the blocks of a CAR file as they are decoded.
    Inspect {
        /// The CAR file to read.
        file: PathBuf,
        /// Size of the chunks the file is read in.
        #[arg(long, default_value_t = 64 * 1024)]
        chunk_size: usize,
    },
    /// Fetch the CAR archive of a CID from the configured gateways.
    Fetch {
        /// The content identifier to fetch.
        cid: Cid,
        /// Path below the CID.
        #[arg(short, long)]
        path: Option<String>,
        /// Which part of the DAG to fetch.
        #[arg(value_enum, long, default_value_t = ScopeArg::Entity)]
        scope: ScopeArg,
        /// Byte range of a file entity, as `<from>:<to>` or `<from>:*`.
        #[arg(long)]
        entity_bytes: Option<ByteRange>,
        /// Extract the fetched tree into this directory instead of listing it.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Extract the UnixFS tree stored in a CAR file.
    Extract {
        /// The CAR file to read.
        file: PathBuf,
        /// The directory to write the tree into.
        out: PathBuf,
    },
    /// Print the loaded configuration.
    PrintConfig {
        /// Print the default configuration instead of loading the current one.
        #[arg(short, long)]
        default: bool,
    },
}
