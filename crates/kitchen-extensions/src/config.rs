//! Provisioning configuration (`civikitchen.toml`).
//!
//! Every field has a default matching the buildkit container layout, so an
//! absent configuration file is valid.
//!
//! ```toml
//! extensions_root = "/home/buildkit/buildkit/build/site/web/sites/default/files/civicrm/ext"
//! sources = ["/extensions"]
//! link = "auto"
//!
//! [host]
//! program = "cv"
//! site_dir = "/home/buildkit/buildkit/build/site/web"
//! exec_prefix = []
//! timeout_secs = 300
//! flush_on_refresh = true
//!
//! [seeding]
//! interpreter = "bash"
//! timeout_secs = 600
//! marker_file = ".civicrm-seeded"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use kitchen_fs::{ConfigStore, KitchenPath};
use serde::{Deserialize, Serialize};

use crate::MARKER_FILENAME;
use crate::error::{Error, Result};
use crate::host::CvHost;
use crate::linker::{LinkStrategy, Linker};
use crate::marker::FileMarkerStore;
use crate::seeder::ShellScriptRunner;

/// Extensions root inside the buildkit container.
pub const DEFAULT_EXTENSIONS_ROOT: &str =
    "/home/buildkit/buildkit/build/site/web/sites/default/files/civicrm/ext";

/// CMS web root `cv` is run from inside the buildkit container.
pub const DEFAULT_SITE_DIR: &str = "/home/buildkit/buildkit/build/site/web";

fn default_extensions_root() -> PathBuf {
    PathBuf::from(DEFAULT_EXTENSIONS_ROOT)
}

fn default_program() -> String {
    "cv".to_string()
}

fn default_site_dir() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_SITE_DIR))
}

fn default_host_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_interpreter() -> String {
    "bash".to_string()
}

fn default_seed_timeout() -> u64 {
    600
}

fn default_marker_file() -> String {
    MARKER_FILENAME.to_string()
}

/// Top-level provisioning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitchenConfig {
    /// Directory the host scans for extensions.
    #[serde(default = "default_extensions_root")]
    pub extensions_root: PathBuf,

    /// Directories whose immediate children are extension source trees.
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    #[serde(default)]
    pub link: LinkStrategy,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub seeding: SeedConfig,
}

/// How to reach the host's `cv` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// Working directory for `cv` when no `exec_prefix` is set.
    #[serde(default = "default_site_dir")]
    pub site_dir: Option<PathBuf>,

    /// Command prepended to every `cv` call, e.g. `["docker", "exec", "-w", "/site", "civicrm"]`.
    #[serde(default)]
    pub exec_prefix: Vec<String>,

    #[serde(default = "default_host_timeout")]
    pub timeout_secs: u64,

    /// Run `cv flush` before rescanning extensions.
    #[serde(default = "default_true")]
    pub flush_on_refresh: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            site_dir: default_site_dir(),
            exec_prefix: Vec::new(),
            timeout_secs: default_host_timeout(),
            flush_on_refresh: true,
        }
    }
}

impl HostConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How seed scripts are executed and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_seed_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_marker_file")]
    pub marker_file: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_seed_timeout(),
            marker_file: default_marker_file(),
        }
    }
}

impl SeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            extensions_root: default_extensions_root(),
            sources: Vec::new(),
            link: LinkStrategy::default(),
            host: HostConfig::default(),
            seeding: SeedConfig::default(),
        }
    }
}

impl KitchenConfig {
    /// Load and validate a configuration file (TOML, JSON or YAML).
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = ConfigStore::new()
            .load(path)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolve the configuration for an invocation.
    ///
    /// An explicit path must exist. Otherwise `civikitchen.toml` in `dir` is
    /// used when present, and the defaults when not.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "configuration file {} does not exist",
                    path.display()
                )));
            }
            return Self::load(path);
        }

        let candidate = dir.join(KitchenPath::ConfigFile.as_str());
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            tracing::debug!("no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.host.timeout_secs == 0 {
            return Err(Error::Config("host.timeout_secs must be positive".to_string()));
        }
        if self.seeding.timeout_secs == 0 {
            return Err(Error::Config("seeding.timeout_secs must be positive".to_string()));
        }
        if self.host.program.trim().is_empty() {
            return Err(Error::Config("host.program must not be empty".to_string()));
        }
        if self.seeding.interpreter.trim().is_empty() {
            return Err(Error::Config("seeding.interpreter must not be empty".to_string()));
        }
        let marker = &self.seeding.marker_file;
        if marker.is_empty() || marker.contains(['/', '\\']) || marker == "." || marker == ".." {
            return Err(Error::Config(format!(
                "seeding.marker_file must be a plain file name, got '{marker}'"
            )));
        }
        Ok(())
    }

    pub fn marker_store(&self) -> FileMarkerStore {
        FileMarkerStore::with_file_name(&self.extensions_root, &self.seeding.marker_file)
    }

    pub fn linker(&self) -> Linker {
        Linker::new(&self.extensions_root, self.link)
    }

    pub fn host(&self) -> CvHost {
        CvHost::new(&self.host)
    }

    pub fn script_runner(&self) -> ShellScriptRunner {
        ShellScriptRunner::new(&self.seeding.interpreter, self.seeding.timeout())
    }
}
