//! `civikitchen list-extensions` and `civikitchen check-manifest`

use std::path::Path;

use colored::Colorize;
use kitchen_extensions::{ExtensionManifest, Inventory, InventoryEntry, ListScope, MANIFEST_FILENAME};

use crate::context::KitchenContext;
use crate::error::Result;

fn yes_no(value: bool) -> colored::ColoredString {
    if value { "yes".green() } else { "no".dimmed() }
}

fn seeded_label(entry: &InventoryEntry) -> colored::ColoredString {
    match (entry.seeding_declared, entry.seeded) {
        (_, None) => "?".yellow(),
        (_, Some(true)) => "yes".green(),
        (true, Some(false)) => "pending".yellow(),
        (false, Some(false)) => "-".dimmed(),
    }
}

/// Print the inventory as a table or JSON. A partial inventory still
/// succeeds; its warnings go to stderr.
pub fn run_list_extensions(ctx: &KitchenContext, local: bool, json: bool) -> Result<()> {
    let scope = if local { ListScope::Local } else { ListScope::All };
    let catalog = ctx.catalog()?;
    let inventory = Inventory::collect(&catalog, &ctx.host, &ctx.markers, scope);

    for warning in &inventory.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }

    if inventory.entries.is_empty() {
        println!("No extensions found under {}", ctx.extensions_root().display());
        return Ok(());
    }

    println!(
        "{:<40} {:<7} {:<12} {:<8} {}",
        "NAME".bold(),
        "LINKED".bold(),
        "HOST".bold(),
        "SEEDED".bold(),
        "LIFECYCLE".bold()
    );
    for entry in &inventory.entries {
        let host = entry.host_status.map(|s| s.as_str()).unwrap_or("-");
        println!(
            "{:<40} {:<7} {:<12} {:<8} {}",
            entry.name,
            yes_no(entry.linked),
            host,
            seeded_label(entry),
            entry.lifecycle.as_str().cyan()
        );
    }
    Ok(())
}

/// Validate a manifest strictly. `path` may be the extension directory.
pub fn run_check_manifest(path: &Path) -> Result<()> {
    let manifest_path = if path.is_dir() {
        path.join(MANIFEST_FILENAME)
    } else {
        path.to_path_buf()
    };
    let manifest = ExtensionManifest::from_path(&manifest_path)?;

    println!("{} {} is valid", "=>".blue().bold(), manifest_path.display());
    if manifest.dependencies.is_empty() {
        println!("   {} none", "Dependencies:".dimmed());
    } else {
        println!("   {} {}", "Dependencies:".dimmed(), manifest.dependencies.join(", ").yellow());
    }
    match manifest.seeding {
        Some(ref seeding) => println!(
            "   {} {} (enabled: {}, runOnce: {})",
            "Seeding:".dimmed(),
            seeding.script,
            seeding.enabled,
            seeding.run_once
        ),
        None => println!("   {} none", "Seeding:".dimmed()),
    }
    Ok(())
}
