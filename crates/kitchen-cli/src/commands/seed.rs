//! `civikitchen seed-extensions` and `civikitchen reset-seed-markers`

use colored::Colorize;
use kitchen_extensions::catalog::validate_name;
use kitchen_extensions::pipeline::seed_order;
use kitchen_extensions::{ResetTarget, SeedOutcome, Seeder};
use serde::Serialize;

use crate::context::KitchenContext;
use crate::error::{CliError, Result};

#[derive(Debug, Serialize)]
struct SeedRow {
    name: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Seed `names` (every linked extension when empty) in dependency order.
///
/// Extensions whose dependencies do not resolve are reported as failed and
/// skipped; the others are still seeded.
pub fn run_seed(ctx: &KitchenContext, names: &[String], force: bool, json: bool) -> Result<()> {
    let catalog = ctx.catalog()?;
    let seeding = seed_order(&catalog, names)?;
    let seeder = Seeder::new(&ctx.markers, &ctx.runner).force(force);

    let results = seeder.seed_all(seeding.order.iter().filter_map(|name| catalog.get(name)));
    let mut rows = Vec::with_capacity(seeding.unresolved.len() + results.len());
    let mut first_code = None;

    let unresolved = seeding.unresolved.into_iter().map(|(name, e)| (name, Err(e)));
    for (name, result) in unresolved.chain(results) {
        let row = match result {
            Ok(outcome) => {
                if !json {
                    let label = match outcome {
                        SeedOutcome::Seeded => outcome.label().green(),
                        _ => outcome.label().dimmed(),
                    };
                    println!("  {:<40} {}", name, label);
                }
                SeedRow {
                    name,
                    outcome: outcome.label(),
                    error: None,
                }
            }
            Err(e) => {
                if !json {
                    println!("  {:<40} {} {}", name, "failed".red().bold(), e);
                }
                first_code.get_or_insert(e.exit_code());
                SeedRow {
                    name,
                    outcome: "failed",
                    error: Some(e.to_string()),
                }
            }
        };
        rows.push(row);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    match first_code {
        None => {
            if !json {
                println!("{} Seeding complete", "=>".blue().bold());
            }
            Ok(())
        }
        Some(code) => Err(CliError::Failed {
            failed: rows.iter().filter(|r| r.error.is_some()).count(),
            total: rows.len(),
            code,
        }),
    }
}

/// Delete the marker of `name`, or every marker.
pub fn run_reset_seed_markers(ctx: &KitchenContext, name: Option<&str>, all: bool) -> Result<()> {
    let target = match (name, all) {
        (_, true) => ResetTarget::All,
        (Some(name), false) => {
            validate_name(name)?;
            ResetTarget::One(name.to_string())
        }
        (None, false) => return Err(CliError::user("name an extension or pass --all")),
    };

    let seeder = Seeder::new(&ctx.markers, &ctx.runner);
    let cleared = seeder.reset_markers(&target)?;

    if cleared.is_empty() {
        println!("{} No seed markers to delete", "=>".blue().bold());
    }
    for name in &cleared {
        println!("{} Reset seed marker for {}", "=>".blue().bold(), name.cyan());
    }
    Ok(())
}
