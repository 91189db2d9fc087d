//! The order command

use colored::Colorize;
use ext_archive::ExtensionMetadata;
use ext_runtime::DependencyGraph;
use serde::Serialize;

use super::{load_config, read_directory};
use crate::cli::Source;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct OrderOutput {
    order: Vec<String>,
    skipped: usize,
}

/// Run the order command
///
/// Rejected archives are left out, exactly as discovery would leave them out.
pub fn run_order(source: &Source, json: bool) -> Result<()> {
    let config = load_config(source)?;
    let scanned = read_directory(&config)?;
    let total = scanned.len();
    let extensions: Vec<ExtensionMetadata> =
        scanned.into_iter().filter_map(|s| s.outcome.ok()).collect();

    let order = DependencyGraph::from_metadata(&extensions).topological_sort()?;
    let output = OrderOutput {
        skipped: total - extensions.len(),
        order,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Load order".bold());
    println!();
    for (position, name) in output.order.iter().enumerate() {
        println!("  {:>3}. {}", position + 1, name.green());
    }
    if output.skipped > 0 {
        println!();
        println!(
            "{} {} rejected archive(s) not shown. Run {} for details.",
            "note:".yellow().bold(),
            output.skipped,
            "extctl scan".cyan()
        );
    }
    Ok(())
}
