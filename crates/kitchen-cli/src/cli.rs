//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use kitchen_extensions::LinkStrategy;

/// civikitchen - Link, enable and seed CiviCRM extensions in a buildkit site
#[derive(Parser, Debug)]
#[command(name = "civikitchen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./civikitchen.toml when present)
    #[arg(short, long, global = true, env = "CIVIKITCHEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Extensions root, overriding the configuration file
    #[arg(long, global = true, env = "CIVIKITCHEN_EXT_DIR")]
    pub ext_dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Make extension source trees visible under the extensions root
    ///
    /// Examples:
    ///   civikitchen link-extension /extensions/org.example.base
    ///   civikitchen link-extension ./a ./b --strategy copy
    LinkExtension {
        /// Extension source directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Symlink, copy, or symlink with copy fallback
        #[arg(long)]
        strategy: Option<LinkStrategy>,
    },

    /// Enable an extension and everything it depends on, dependencies first
    InstallDependencies {
        /// Extension name, e.g. org.example.target
        name: String,
    },

    /// Run seed scripts of linked extensions
    ///
    /// Without names every linked extension is seeded, dependencies first.
    SeedExtensions {
        /// Extensions to seed
        names: Vec<String>,

        /// Ignore existing seed markers
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show linked and host-known extensions with their state
    ListExtensions {
        /// Only extensions the host has registered locally
        #[arg(long)]
        local: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Delete seed markers so seeding runs again
    ResetSeedMarkers {
        /// Extension whose marker to delete
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        name: Option<String>,

        /// Delete every marker
        #[arg(long)]
        all: bool,
    },

    /// Link, enable and seed in one run
    ///
    /// Links every extension found in the configured source directories,
    /// then enables and seeds the named extensions (all linked ones when
    /// none are named).
    Provision {
        /// Extensions to provision
        names: Vec<String>,

        /// Additional source directories to link
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Ignore existing seed markers
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Disable an enabled extension
    DisableExtension {
        /// Extension name
        name: String,
    },

    /// Uninstall a disabled extension
    UninstallExtension {
        /// Extension name
        name: String,

        /// Disable the extension first
        #[arg(long)]
        disable: bool,
    },

    /// Remove an extension from the extensions root
    UnlinkExtension {
        /// Extension name
        name: String,
    },

    /// Validate an extension's civikitchen.json strictly
    CheckManifest {
        /// Extension directory or manifest file
        path: PathBuf,
    },

    /// Generate shell completions
    ///
    /// Examples:
    ///   civikitchen completions bash > ~/.local/share/bash-completion/completions/civikitchen
    ///   civikitchen completions zsh > ~/.zfunc/_civikitchen
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Shared output switch.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputArgs {
    /// Output as JSON for scripting
    #[arg(long)]
    pub json: bool,
}
