//! Extension provisioning engine for civikitchen.
//!
//! Links extension source trees into the host's extensions root, resolves
//! the dependency order declared in each extension's `civikitchen.json`,
//! drives the host's extension lifecycle, and runs one-shot seed scripts
//! guarded by marker files.

pub mod catalog;
pub mod config;
pub mod dependency;
pub mod error;
pub mod exec;
pub mod host;
pub mod installer;
pub mod inventory;
pub mod linker;
pub mod manifest;
pub mod marker;
pub mod pipeline;
pub mod seeder;

use kitchen_fs::KitchenPath;

/// The canonical filename for extension manifest files.
pub const MANIFEST_FILENAME: &str = KitchenPath::Manifest.as_str();

/// The default marker file written at an extension's linked root.
pub const MARKER_FILENAME: &str = KitchenPath::SeedMarker.as_str();

pub use catalog::{Extension, ExtensionCatalog};
pub use config::{HostConfig, KitchenConfig, SeedConfig};
pub use dependency::{DependencyGraph, InstallPlan};
pub use error::{Error, ErrorKind, Result, Stage};
pub use host::{CvHost, HostApplication, HostExtension, HostStatus, ListScope, MemoryHost};
pub use installer::{EnableOutcome, EnableReport, Installer};
pub use inventory::{Inventory, InventoryEntry, Lifecycle};
pub use linker::{LinkMethod, LinkOutcome, LinkStrategy, LinkedExtension, Linker};
pub use manifest::{ExtensionManifest, ManifestStatus, Seeding};
pub use marker::{FileMarkerStore, MarkerStore, MemoryMarkerStore};
pub use pipeline::{Pipeline, ProvisionReport, SeedOrder, StageResult, StageStatus};
pub use seeder::{ResetTarget, ScriptRunner, SeedOutcome, Seeder, ShellScriptRunner};
