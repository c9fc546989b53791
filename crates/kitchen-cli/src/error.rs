//! Error types for kitchen-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that end a `civikitchen` invocation
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from kitchen-extensions
    #[error(transparent)]
    Extensions(#[from] kitchen_extensions::Error),

    /// Error from kitchen-fs
    #[error(transparent)]
    Fs(#[from] kitchen_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A batch finished with failed entries, already reported per extension
    #[error("{failed} of {total} entries failed")]
    Failed { failed: usize, total: usize, code: i32 },

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Extensions(e) => e.exit_code(),
            Self::Failed { code, .. } => *code,
            Self::Fs(_) | Self::Io(_) | Self::Json(_) | Self::User { .. } => 1,
        }
    }
}
