//! Error types for kitchen-fs

use std::path::PathBuf;

/// Result type for kitchen-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kitchen-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation on `path` failed.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {format} in {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("cannot write {path} as {format}: {message}")]
    ConfigSerialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    /// Configuration files are `.toml`, `.json`, `.yaml` or `.yml`.
    #[error("unsupported configuration format '.{extension}'")]
    UnsupportedFormat { extension: String },

    /// Another writer holds the lock on `path`.
    #[error("could not lock {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
