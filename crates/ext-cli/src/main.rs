//! extctl
//!
//! Command-line inspection of extension archives: what is in a directory,
//! which archives discovery would reject, and the order extensions load in.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        if let Err(e) = ext_runtime::logging::init("debug") {
            eprintln!("{} could not enable logging: {e}", "warning:".yellow().bold());
        }
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Scan { source, json }) => commands::run_scan(&source, json),
        Some(Commands::Order { source, json }) => commands::run_order(&source, json),
        Some(Commands::Inspect { archive, json }) => commands::run_inspect(&archive, json),
        None => {
            println!("{} Extension archive tool", "extctl".green().bold());
            println!();
            println!("Run {} for available commands.", "extctl --help".cyan());
            Ok(())
        }
    }
}
