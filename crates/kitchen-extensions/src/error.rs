use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Errors that can occur while provisioning extensions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `civikitchen.json` is not valid JSON or does not have the required shape.
    #[error("failed to parse extension manifest {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// Extension manifest file not found at the expected path.
    #[error("extension manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// Invalid extension name.
    #[error("invalid extension name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// An extension depends on an extension that is not present.
    #[error("extension '{requester}' depends on '{missing}', which is not present")]
    MissingDependency { requester: String, missing: String },

    /// A requested extension is not present.
    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// The extension could not be made visible under the extensions root.
    #[error("failed to link extension '{name}': {reason}")]
    Link { name: String, reason: String },

    /// A host lifecycle command failed. `message` keeps the host's raw output.
    #[error("host {operation} failed for '{target}': {message}")]
    HostOperation {
        operation: &'static str,
        target: String,
        message: String,
    },

    /// A host lifecycle command did not finish in time.
    #[error("host {operation} for '{target}' timed out after {}s", timeout.as_secs())]
    HostTimeout {
        operation: &'static str,
        target: String,
        timeout: Duration,
    },

    /// A seed script failed; no marker was written.
    #[error("seeding '{name}' failed: {reason}")]
    SeedExecution { name: String, reason: String },

    /// Invalid provisioning configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Filesystem layer error.
    #[error(transparent)]
    Fs(#[from] kitchen_fs::Error),

    /// I/O error reading or writing extension files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes with stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ManifestParse,
    DependencyCycle,
    MissingDependency,
    Link,
    HostOperation,
    SeedExecution,
    Config,
    Other,
}

impl ErrorKind {
    /// Process exit code reported for a fatal error of this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Other => 1,
            Self::Link => 3,
            Self::DependencyCycle => 4,
            Self::MissingDependency => 5,
            Self::HostOperation => 6,
            Self::SeedExecution => 7,
            Self::Config => 8,
            Self::ManifestParse => 9,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ManifestParse { .. } | Self::ManifestNotFound(_) => ErrorKind::ManifestParse,
            Self::DependencyCycle { .. } => ErrorKind::DependencyCycle,
            Self::MissingDependency { .. } | Self::UnknownExtension(_) => {
                ErrorKind::MissingDependency
            }
            Self::Link { .. } | Self::InvalidName { .. } => ErrorKind::Link,
            Self::HostOperation { .. } | Self::HostTimeout { .. } => ErrorKind::HostOperation,
            Self::SeedExecution { .. } => ErrorKind::SeedExecution,
            Self::Config(_) => ErrorKind::Config,
            Self::Fs(_) | Self::Io(_) => ErrorKind::Other,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    pub(crate) fn link(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Link {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn seed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SeedExecution {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Provisioning stage an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Link,
    Resolve,
    Install,
    Seed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Resolve => "resolve",
            Self::Install => "install",
            Self::Seed => "seed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
