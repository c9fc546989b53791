//! civikitchen CLI
//!
//! Links CiviCRM extensions into a buildkit site, enables them through `cv`
//! in dependency order and runs their seed scripts.

mod cli;
mod commands;
mod context;
mod error;
mod logging;

use std::io;

use clap::{CommandFactory, Parser};
use colored::Colorize;

use cli::{Cli, Commands};
use context::KitchenContext;
use error::Result;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: failed to initialise logging: {}", "warning".yellow().bold(), e);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    tracing::debug!(command = ?cli.command, "starting");

    // Commands that need no configuration.
    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "civikitchen", &mut io::stdout());
            return Ok(());
        }
        Commands::CheckManifest { ref path } => return commands::run_check_manifest(path),
        _ => {}
    }

    let cwd = std::env::current_dir()?;
    let ctx = KitchenContext::load(&cwd, cli.config.as_deref(), cli.ext_dir)?;
    execute_command(&ctx, cli.command)
}

fn execute_command(ctx: &KitchenContext, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::LinkExtension { paths, strategy } => commands::run_link(ctx, &paths, strategy),
        Commands::InstallDependencies { name } => commands::run_install_dependencies(ctx, &name),
        Commands::SeedExtensions { names, force, output } => {
            commands::run_seed(ctx, &names, force, output.json)
        }
        Commands::ListExtensions { local, output } => {
            commands::run_list_extensions(ctx, local, output.json)
        }
        Commands::ResetSeedMarkers { name, all } => {
            commands::run_reset_seed_markers(ctx, name.as_deref(), all)
        }
        Commands::Provision {
            names,
            sources,
            force,
            output,
        } => commands::run_provision(ctx, &names, &sources, force, output.json),
        Commands::DisableExtension { name } => commands::run_disable(ctx, &name),
        Commands::UninstallExtension { name, disable } => commands::run_uninstall(ctx, &name, disable),
        Commands::UnlinkExtension { name } => commands::run_unlink(ctx, &name),
        Commands::CheckManifest { path } => commands::run_check_manifest(&path),
        Commands::Completions { .. } => Ok(()),
    }
}
