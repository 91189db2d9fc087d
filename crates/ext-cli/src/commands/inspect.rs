//! The inspect command

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use ext_archive::{Archive, ConfigValue, ExtensionMetadata, METADATA_ENTRY, ZipPackage};
use ext_runtime::symbol;
use serde::Serialize;

use crate::error::Result;

/// Keys of the metadata document that are not free-form configuration.
const REQUIRED_KEYS: [&str; 4] = ["main", "name", "version", "depends"];

#[derive(Debug, Serialize)]
struct InspectOutput {
    file: String,
    sha256: String,
    name: String,
    version: String,
    main: String,
    entry_symbol_present: bool,
    depends: Vec<String>,
    values: BTreeMap<String, String>,
    symbols: Vec<String>,
}

fn describe(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(s) => s.clone(),
        ConfigValue::Integer(i) => i.to_string(),
        ConfigValue::Float(f) => f.to_string(),
        ConfigValue::Bool(b) => b.to_string(),
        ConfigValue::List(items) => format!(
            "[{}]",
            items.iter().map(describe).collect::<Vec<_>>().join(", ")
        ),
        ConfigValue::Map(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{k}: {}", describe(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Run the inspect command
pub fn run_inspect(path: &Path, json: bool) -> Result<()> {
    let mut archive = ZipPackage::open(path)?;
    let metadata = ExtensionMetadata::from_archive(&mut archive, METADATA_ENTRY)?;

    let mut symbols: Vec<String> = archive
        .entry_names()
        .iter()
        .filter_map(|entry| symbol::symbol_name(entry))
        .collect();
    symbols.sort();

    let values = metadata
        .values
        .iter()
        .filter(|(key, _)| !REQUIRED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), describe(value)))
        .collect();

    let output = InspectOutput {
        file: path.display().to_string(),
        sha256: ext_archive::archive_checksum(path)?,
        entry_symbol_present: symbols.contains(&metadata.main),
        name: metadata.name,
        version: metadata.version,
        main: metadata.main,
        depends: metadata.depends,
        values,
        symbols,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} {}", output.name.green().bold(), output.version);
    println!("  {:<10} {}", "file".dimmed(), output.file);
    println!("  {:<10} {}", "sha256".dimmed(), output.sha256);
    let entry_status = if output.entry_symbol_present {
        "present".green()
    } else {
        "missing".red()
    };
    println!("  {:<10} {} ({})", "main".dimmed(), output.main, entry_status);
    if !output.depends.is_empty() {
        println!("  {:<10} {}", "depends".dimmed(), output.depends.join(", "));
    }
    for (key, value) in &output.values {
        println!("  {:<10} {}", key.dimmed(), value);
    }

    println!();
    println!("{} ({})", "Symbols".bold(), output.symbols.len());
    for name in &output.symbols {
        println!("  {}", name.cyan());
    }
    Ok(())
}
