//! Extension identity and discovery.
//!
//! An extension is a directory containing an `info.xml` (as generated by
//! civix) and/or a `civikitchen.json` manifest. Its name is the `key`
//! attribute of `<extension>` in `info.xml`, falling back to the directory
//! name; its short key is the `<file>` element, falling back to the last
//! dot-separated segment of the name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use kitchen_fs::KitchenPath;
use regex::Regex;

use crate::MANIFEST_FILENAME;
use crate::error::{Error, Result};
use crate::manifest::{self, ExtensionManifest, ManifestStatus};

static INFO_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<extension\b[^>]*\bkey\s*=\s*["']([^"']+)["']"#).unwrap());

static INFO_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<file>\s*([^<\s]+)\s*</file>").unwrap());

/// A discovered extension and its manifest.
#[derive(Debug, Clone)]
pub struct Extension {
    /// Full reverse-domain name, e.g. `org.project60.sepa`.
    pub name: String,
    /// Short key used for file and script naming, e.g. `sepa`.
    pub key: String,
    /// Directory holding the extension.
    pub path: PathBuf,
    pub manifest: ExtensionManifest,
    pub manifest_status: ManifestStatus,
}

impl Extension {
    /// Identify the extension rooted at `dir` and read its manifest.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let (name, key) = identify(dir)?;
        let (manifest, manifest_status) = manifest::load(dir);
        Ok(Self {
            name,
            key,
            path: dir.to_path_buf(),
            manifest,
            manifest_status,
        })
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.manifest.dependencies
    }
}

/// Determine `(name, short key)` for the extension rooted at `dir`.
pub fn identify(dir: &Path) -> Result<(String, String)> {
    let info = kitchen_fs::io::read_text_if_exists(&dir.join(KitchenPath::InfoXml.as_str()))?;

    let name = info
        .as_deref()
        .and_then(|xml| INFO_KEY_PATTERN.captures(xml))
        .map(|c| c[1].to_string())
        .or_else(|| dir_name(dir))
        .ok_or_else(|| Error::InvalidName {
            name: dir.display().to_string(),
            reason: "cannot derive an extension name from this path".to_string(),
        })?;
    validate_name(&name)?;

    let key = info
        .as_deref()
        .and_then(|xml| INFO_FILE_PATTERN.captures(xml))
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| short_key(&name).to_string());

    Ok((name, key))
}

/// Directory name of `dir`; paths like `.` are canonicalized first.
fn dir_name(dir: &Path) -> Option<String> {
    match dir.file_name() {
        Some(name) => Some(name.to_string_lossy().into_owned()),
        None => dunce::canonicalize(dir)
            .ok()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
    }
}

/// Last dot-separated segment of a reverse-domain name.
pub fn short_key(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Validate an extension name for use as a directory name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "extension name must not be empty".to_string(),
        });
    }
    if name.starts_with('.') {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "extension name must not start with a dot".to_string(),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "extension name must contain only alphanumeric characters, dots, hyphens, or underscores".to_string(),
        });
    }
    Ok(())
}

/// Whether `dir` looks like an extension directory.
pub fn is_extension_dir(dir: &Path) -> bool {
    dir.is_dir()
        && (dir.join(KitchenPath::InfoXml.as_str()).is_file()
            || dir.join(MANIFEST_FILENAME).is_file())
}

/// Extensions discovered under one or more directories, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ExtensionCatalog {
    extensions: BTreeMap<String, Extension>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover the extensions that are immediate children of `dir`.
    ///
    /// A missing directory yields an empty catalog.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.scan(dir)?;
        Ok(catalog)
    }

    /// Discover extensions under several directories. When two directories
    /// contain the same extension name the first one wins.
    pub fn discover_all(dirs: &[PathBuf]) -> Result<Self> {
        let mut catalog = Self::new();
        for dir in dirs {
            catalog.scan(dir)?;
        }
        Ok(catalog)
    }

    fn scan(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "extension directory does not exist");
            return Ok(());
        }

        let mut children: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| kitchen_fs::Error::io(dir, e))?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'))
            })
            .collect();
        children.sort();

        for child in children {
            if !is_extension_dir(&child) {
                continue;
            }
            match Extension::from_dir(&child) {
                Ok(ext) => {
                    self.insert(ext);
                }
                Err(e) => tracing::warn!(path = %child.display(), "skipping extension: {e}"),
            }
        }
        Ok(())
    }

    /// Add an extension. Returns `false` (and keeps the existing entry) if
    /// the name is already present.
    pub fn insert(&mut self, extension: Extension) -> bool {
        if let Some(existing) = self.extensions.get(&extension.name) {
            tracing::debug!(
                name = %extension.name,
                kept = %existing.path.display(),
                ignored = %extension.path.display(),
                "duplicate extension name"
            );
            return false;
        }
        self.extensions.insert(extension.name.clone(), extension);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.extensions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// All extension names (sorted).
    pub fn names(&self) -> Vec<String> {
        self.extensions.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.values()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
