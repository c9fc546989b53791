//! `civikitchen provision` and `civikitchen install-dependencies`

use std::path::PathBuf;

use kitchen_extensions::{ExtensionCatalog, Stage};

use crate::commands::report;
use crate::context::KitchenContext;
use crate::error::{CliError, Result};

/// Extension source trees under the configured and extra source directories.
fn source_trees(ctx: &KitchenContext, extra: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let dirs: Vec<PathBuf> = ctx.config.sources.iter().chain(extra).cloned().collect();
    for dir in &dirs {
        if !dir.is_dir() {
            return Err(CliError::user(format!(
                "source directory {} does not exist",
                dir.display()
            )));
        }
    }
    let catalog = ExtensionCatalog::discover_all(&dirs)?;
    Ok(catalog.iter().map(|e| e.path.clone()).collect())
}

/// Link everything in the source directories, then enable and seed
/// `names` (every linked extension when empty).
pub fn run_provision(
    ctx: &KitchenContext,
    names: &[String],
    extra_sources: &[PathBuf],
    force: bool,
    json: bool,
) -> Result<()> {
    let sources = source_trees(ctx, extra_sources)?;
    tracing::debug!(count = sources.len(), "source trees found");
    let report = ctx.pipeline().force_seed(force).run(&sources, names);
    report::finish(&report, json)
}

/// Enable `name` and its dependencies, dependencies first.
pub fn run_install_dependencies(ctx: &KitchenContext, name: &str) -> Result<()> {
    let report = ctx
        .pipeline()
        .with_stages(&[Stage::Install])
        .run(&[], &[name.to_string()]);
    report::finish(&report, false)
}
