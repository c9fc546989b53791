//! Invocation context
//!
//! Resolves the configuration for one `civikitchen` run and builds the
//! engine components from it.

use std::path::{Path, PathBuf};

use kitchen_extensions::{
    CvHost, ExtensionCatalog, FileMarkerStore, KitchenConfig, Linker, Pipeline, ShellScriptRunner,
};

use crate::error::Result;

/// Everything a command needs to reach the extensions root and the host.
pub struct KitchenContext {
    pub config: KitchenConfig,
    pub linker: Linker,
    pub host: CvHost,
    pub markers: FileMarkerStore,
    pub runner: ShellScriptRunner,
}

impl KitchenContext {
    /// Load the configuration (explicit path, else `civikitchen.toml` in
    /// `cwd`, else defaults) and apply the extensions-root override.
    pub fn load(cwd: &Path, config: Option<&Path>, ext_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = KitchenConfig::discover(config, cwd)?;
        if let Some(ext_dir) = ext_dir {
            config.extensions_root = ext_dir;
        }
        tracing::debug!(
            extensions_root = %config.extensions_root.display(),
            program = %config.host.program,
            "context loaded"
        );
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: KitchenConfig) -> Self {
        Self {
            linker: config.linker(),
            host: config.host(),
            markers: config.marker_store(),
            runner: config.script_runner(),
            config,
        }
    }

    pub fn extensions_root(&self) -> &Path {
        &self.config.extensions_root
    }

    /// Extensions currently present under the extensions root.
    pub fn catalog(&self) -> Result<ExtensionCatalog> {
        Ok(ExtensionCatalog::discover(self.extensions_root())?)
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.linker, &self.host, &self.markers, &self.runner)
    }
}
