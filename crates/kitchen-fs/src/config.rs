//! Format-agnostic configuration loading and saving

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result, io};

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension and handles
/// serialization/deserialization transparently.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    ///
    /// Format is detected from file extension:
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let extension = extension_of(path);
        // Reject unknown formats before touching the filesystem
        Format::detect(&extension)?;
        let content = io::read_text(path)?;
        self.parse(path, &extension, &content)
    }

    /// Parse configuration content that was read from `path`.
    pub fn parse<T: DeserializeOwned>(&self, path: &Path, extension: &str, content: &str) -> Result<T> {
        match Format::detect(extension)? {
            Format::Toml => toml::from_str(content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "TOML".into(),
                message: e.to_string(),
            }),
            Format::Json => serde_json::from_str(content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "JSON".into(),
                message: e.to_string(),
            }),
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "YAML".into(),
                message: e.to_string(),
            }),
        }
    }

    /// Save configuration to a file.
    ///
    /// Format is determined from file extension.
    /// Uses atomic write to prevent corruption.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let content = match Format::detect(&extension_of(path))? {
            Format::Toml => toml::to_string_pretty(value).map_err(|e| Error::ConfigSerialize {
                path: path.to_path_buf(),
                format: "TOML".into(),
                message: e.to_string(),
            })?,
            Format::Json => serde_json::to_string_pretty(value).map_err(|e| Error::ConfigSerialize {
                path: path.to_path_buf(),
                format: "JSON".into(),
                message: e.to_string(),
            })?,
            Format::Yaml => serde_yaml::to_string(value).map_err(|e| Error::ConfigSerialize {
                path: path.to_path_buf(),
                format: "YAML".into(),
                message: e.to_string(),
            })?,
        };

        tracing::debug!(path = %path.display(), "writing config");
        io::write_atomic(path, content.as_bytes())
    }
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Toml,
    Json,
    Yaml,
}

impl Format {
    fn detect(extension: &str) -> Result<Self> {
        match extension {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
