//! `civikitchen link-extension`

use std::path::PathBuf;

use colored::Colorize;
use kitchen_extensions::{LinkOutcome, LinkStrategy, Linker};

use crate::context::KitchenContext;
use crate::error::{CliError, Result};

/// Link every path; a failed path does not stop the others.
pub fn run_link(ctx: &KitchenContext, paths: &[PathBuf], strategy: Option<LinkStrategy>) -> Result<()> {
    let linker = match strategy {
        Some(strategy) => Linker::new(ctx.extensions_root(), strategy),
        None => ctx.linker.clone(),
    };

    let mut first_code = None;
    let mut failed = 0;
    for (path, result) in paths.iter().zip(linker.link_all(paths)) {
        match result {
            Ok(linked) => {
                let verb = match linked.outcome {
                    LinkOutcome::Created => "Linked",
                    LinkOutcome::AlreadyLinked => "Already linked",
                    LinkOutcome::Resynced => "Resynced",
                };
                println!(
                    "{} {} {} ({})",
                    "=>".blue().bold(),
                    verb,
                    linked.name.cyan(),
                    linked.method.as_str().dimmed()
                );
                println!("   {} {}", "at".dimmed(), linked.destination.display());
            }
            Err(e) => {
                eprintln!("{} {}: {}", "failed".red().bold(), path.display(), e);
                first_code.get_or_insert(e.exit_code());
                failed += 1;
            }
        }
    }

    match first_code {
        None => Ok(()),
        Some(code) => Err(CliError::Failed {
            failed,
            total: paths.len(),
            code,
        }),
    }
}
