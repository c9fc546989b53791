//! Seed markers: the idempotence guard for one-shot seed scripts.
//!
//! A marker records that an extension's seed script ran to completion.
//! Only its presence matters. [`FileMarkerStore`] keeps markers as sentinel
//! files at each extension's linked root; [`MemoryMarkerStore`] keeps them
//! in memory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::MARKER_FILENAME;
use crate::catalog::{self, validate_name};
use crate::error::{Error, Result};

/// Storage for seed markers, keyed by extension name.
pub trait MarkerStore {
    /// Whether the extension's one-shot seed has completed.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Record that the extension's seed completed.
    fn set(&self, name: &str) -> Result<()>;

    /// Remove the marker. Returns `true` if one was present.
    fn clear(&self, name: &str) -> Result<bool>;

    /// Names of all extensions with a marker, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

impl<M: MarkerStore + ?Sized> MarkerStore for &M {
    fn exists(&self, name: &str) -> Result<bool> {
        (**self).exists(name)
    }

    fn set(&self, name: &str) -> Result<()> {
        (**self).set(name)
    }

    fn clear(&self, name: &str) -> Result<bool> {
        (**self).clear(name)
    }

    fn list(&self) -> Result<Vec<String>> {
        (**self).list()
    }
}

/// Markers stored as sentinel files at `<extensions_root>/<dir>/<file_name>`.
///
/// `<dir>` is normally the extension name. Extensions installed by other
/// means may sit in a directory named differently from their key; those are
/// found through their `info.xml`.
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    extensions_root: PathBuf,
    file_name: String,
}

impl FileMarkerStore {
    pub fn new(extensions_root: impl Into<PathBuf>) -> Self {
        Self::with_file_name(extensions_root, MARKER_FILENAME)
    }

    pub fn with_file_name(extensions_root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            extensions_root: extensions_root.into(),
            file_name: file_name.into(),
        }
    }

    pub fn extensions_root(&self) -> &Path {
        &self.extensions_root
    }

    /// Path of the marker file for `name`.
    pub fn marker_path(&self, name: &str) -> PathBuf {
        self.extension_dir(name)
            .unwrap_or_else(|| self.extensions_root.join(name))
            .join(&self.file_name)
    }

    /// Directory under the extensions root holding the extension `name`.
    fn extension_dir(&self, name: &str) -> Option<PathBuf> {
        let direct = self.extensions_root.join(name);
        if direct.is_dir() {
            return Some(direct);
        }
        std::fs::read_dir(&self.extensions_root)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|dir| dir.is_dir())
            .find(|dir| catalog::identify(dir).is_ok_and(|(found, _)| found == name))
    }
}

impl MarkerStore for FileMarkerStore {
    fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.marker_path(name).is_file())
    }

    fn set(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let extension_dir = self
            .extension_dir(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        let stamp = format!("{}\n", chrono::Utc::now().to_rfc3339());
        kitchen_fs::io::write_text(&extension_dir.join(&self.file_name), &stamp)?;
        tracing::debug!(extension = name, "seed marker written");
        Ok(())
    }

    fn clear(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let removed = kitchen_fs::io::remove_file_if_exists(&self.marker_path(name))?;
        if removed {
            tracing::debug!(extension = name, "seed marker removed");
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.extensions_root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.extensions_root)
            .map_err(|e| kitchen_fs::Error::io(&self.extensions_root, e))?;

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|dir| dir.join(&self.file_name).is_file())
            .filter_map(|dir| match catalog::identify(&dir) {
                Ok((name, _)) => Some(name),
                Err(e) => {
                    tracing::warn!(path = %dir.display(), "skipping seed marker: {e}");
                    None
                }
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// In-memory marker store.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    markers: Mutex<BTreeSet<String>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        // A poisoned set of names is still a valid set of names.
        self.markers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock().contains(name))
    }

    fn set(&self, name: &str) -> Result<()> {
        self.lock().insert(name.to_string());
        Ok(())
    }

    fn clear(&self, name: &str) -> Result<bool> {
        Ok(self.lock().remove(name))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.lock().iter().cloned().collect())
    }
}
