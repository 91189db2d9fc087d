//! The scan command

use colored::Colorize;
use serde::Serialize;

use super::{ScannedArchive, load_config, read_directory};
use crate::cli::Source;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct ScanOutput {
    extensions: Vec<ExtensionEntry>,
    rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Serialize)]
struct ExtensionEntry {
    name: String,
    version: String,
    main: String,
    depends: Vec<String>,
    file: String,
}

#[derive(Debug, Serialize)]
struct RejectedEntry {
    file: String,
    reason: String,
}

fn summarize(scanned: Vec<ScannedArchive>) -> ScanOutput {
    let mut output = ScanOutput {
        extensions: Vec::new(),
        rejected: Vec::new(),
    };
    for archive in scanned {
        let file = archive.file.display().to_string();
        match archive.outcome {
            Ok(metadata) => output.extensions.push(ExtensionEntry {
                name: metadata.name,
                version: metadata.version,
                main: metadata.main,
                depends: metadata.depends,
                file,
            }),
            Err(reason) => output.rejected.push(RejectedEntry { file, reason }),
        }
    }
    output
}

/// Run the scan command
pub fn run_scan(source: &Source, json: bool) -> Result<()> {
    let config = load_config(source)?;
    let output = summarize(read_directory(&config)?);

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Extensions in".bold(),
        config.extensions_dir.display().to_string().cyan()
    );
    println!();

    for ext in &output.extensions {
        let depends = if ext.depends.is_empty() {
            String::new()
        } else {
            format!(" depends on {}", ext.depends.join(", "))
        };
        println!(
            "  {} {:<20} {:<10}{}",
            "✓".green(),
            ext.name.green(),
            ext.version,
            depends.dimmed()
        );
    }
    for rejected in &output.rejected {
        println!("  {} {}", "✗".red(), rejected.file.red());
        println!("      {}", rejected.reason.dimmed());
    }

    println!();
    println!(
        "{} {} valid, {} rejected.",
        "Total:".dimmed(),
        output.extensions.len(),
        output.rejected.len()
    );
    Ok(())
}
