//! Extension manifest parsing for `civikitchen.json` files.
//!
//! A manifest declares an extension's seeding directive and the extensions
//! it depends on. The canonical filename is
//! [`MANIFEST_FILENAME`](crate::MANIFEST_FILENAME) (`civikitchen.json`).
//!
//! # Example
//!
//! ```json
//! {
//!   "seeding": {
//!     "enabled": true,
//!     "script": "scripts/seed-test-data.sh",
//!     "runOnce": true
//!   },
//!   "dependencies": ["org.project60.banking"]
//! }
//! ```
//!
//! A missing or malformed manifest never blocks provisioning: [`load`]
//! falls back to [`ExtensionManifest::default`] (no seeding, no
//! dependencies) and logs a warning.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::MANIFEST_FILENAME;
use crate::error::{Error, Result};

/// Complete extension manifest loaded from `civikitchen.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtensionManifest {
    /// Seed script directive. Absent means the extension has no seed data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeding: Option<Seeding>,
    /// Names of extensions that must be enabled before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Seeding directive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seeding {
    /// When false the seed script is never invoked.
    pub enabled: bool,
    /// Seed script path, relative to the extension root.
    pub script: String,
    /// When true a marker suppresses re-execution.
    pub run_once: bool,
}

/// How a manifest was obtained by [`load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// Parsed from `civikitchen.json`.
    Loaded,
    /// No manifest file; the empty manifest is used.
    Absent,
    /// The file exists but was rejected; the empty manifest is used.
    Invalid(String),
}

impl ExtensionManifest {
    /// Parse a manifest from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        Self::parse(content, Path::new(MANIFEST_FILENAME))
    }

    /// Read and parse a manifest from a file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = kitchen_fs::io::read_text_if_exists(path)?
            .ok_or_else(|| Error::ManifestNotFound(path.to_path_buf()))?;
        Self::parse(&content, path)
    }

    /// Serialize the manifest back to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ManifestParse {
            path: PathBuf::from(MANIFEST_FILENAME),
            reason: e.to_string(),
        })
    }

    /// The seeding directive, if present and enabled.
    pub fn active_seeding(&self) -> Option<&Seeding> {
        self.seeding.as_ref().filter(|s| s.enabled)
    }

    /// Whether this manifest declares an enabled seed script.
    pub fn seeding_enabled(&self) -> bool {
        self.active_seeding().is_some()
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut manifest: Self =
            serde_json::from_str(content).map_err(|e| Error::ManifestParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        manifest
            .validate()
            .map_err(|reason| Error::ManifestParse {
                path: path.to_path_buf(),
                reason,
            })?;
        manifest.dedup_dependencies();
        Ok(manifest)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(ref seeding) = self.seeding {
            let script = Path::new(&seeding.script);
            if seeding.script.trim().is_empty() {
                return Err("seeding.script must not be empty".to_string());
            }
            if script.has_root() {
                return Err(format!(
                    "seeding.script must be relative to the extension root, got {:?}",
                    seeding.script
                ));
            }
            if script.components().any(|c| c == Component::ParentDir) {
                return Err(format!(
                    "seeding.script must stay inside the extension, got {:?}",
                    seeding.script
                ));
            }
        }

        if self.dependencies.iter().any(|d| d.trim().is_empty()) {
            return Err("dependencies must not contain empty names".to_string());
        }

        Ok(())
    }

    /// The dependency list is an ordered set: keep the first occurrence.
    fn dedup_dependencies(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.dependencies.retain(|d| seen.insert(d.clone()));
    }
}

/// Read the manifest of the extension rooted at `extension_dir`.
///
/// Never fails: an absent file yields the empty manifest, a malformed one
/// yields the empty manifest plus a warning.
pub fn load(extension_dir: &Path) -> (ExtensionManifest, ManifestStatus) {
    let path = extension_dir.join(MANIFEST_FILENAME);
    match ExtensionManifest::from_path(&path) {
        Ok(manifest) => (manifest, ManifestStatus::Loaded),
        Err(Error::ManifestNotFound(_)) => {
            tracing::debug!(path = %path.display(), "no manifest, using empty manifest");
            (ExtensionManifest::default(), ManifestStatus::Absent)
        }
        Err(e) => {
            tracing::warn!("{e}; treating extension as having no seeding and no dependencies");
            (ExtensionManifest::default(), ManifestStatus::Invalid(e.to_string()))
        }
    }
}

/// Like [`load`] but discards the status.
pub fn load_or_default(extension_dir: &Path) -> ExtensionManifest {
    load(extension_dir).0
}
