//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// extctl - Inspect extension archives and their load order
#[derive(Parser, Debug)]
#[command(name = "extctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where to find extensions
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Extensions directory (overrides the config file)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Loader configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List the archives in the extensions directory
    ///
    /// Every archive is checked the way the runtime checks it during
    /// discovery: readable container, complete metadata, unique name.
    Scan {
        #[command(flatten)]
        source: Source,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the order in which extensions would be loaded
    Order {
        #[command(flatten)]
        source: Source,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show metadata, symbols and checksum of one archive
    Inspect {
        /// Path to the archive
        archive: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
