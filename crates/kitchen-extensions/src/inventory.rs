//! Read-only view of extensions: linked, host status, seeded.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::ExtensionCatalog;
use crate::host::{HostApplication, HostStatus, ListScope};
use crate::marker::MarkerStore;

/// Observed position in the extension lifecycle.
///
/// `Unknown -> Linked -> Refreshed -> Enabled <-> Disabled -> Uninstalled`,
/// plus `Missing` for registrations whose code has disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Unknown,
    /// Present under the extensions root, not yet seen by the host.
    Linked,
    /// Seen by the host, never installed.
    Refreshed,
    Enabled,
    Disabled,
    /// Seen by the host, previously installed and seeded.
    Uninstalled,
    Missing,
}

impl Lifecycle {
    fn observe(linked: bool, status: Option<HostStatus>, seeded: bool) -> Self {
        match status {
            Some(HostStatus::Enabled) => Self::Enabled,
            Some(HostStatus::Disabled) => Self::Disabled,
            Some(HostStatus::Missing) => Self::Missing,
            // The host reports never-installed and uninstalled alike; a seed
            // marker means it was installed at some point.
            Some(HostStatus::Uninstalled) if seeded => Self::Uninstalled,
            Some(HostStatus::Uninstalled) => Self::Refreshed,
            Some(HostStatus::Unknown) | None if linked => Self::Linked,
            Some(HostStatus::Unknown) | None => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Linked => "linked",
            Self::Refreshed => "refreshed",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Uninstalled => "uninstalled",
            Self::Missing => "missing",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extension in an [`Inventory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub name: String,
    /// Short key, known only for linked extensions.
    pub key: Option<String>,
    pub path: Option<PathBuf>,
    pub linked: bool,
    /// `None` when the host does not know the extension or could not be asked.
    pub host_status: Option<HostStatus>,
    pub enabled: bool,
    /// `None` when the marker lookup failed.
    pub seeded: Option<bool>,
    pub seeding_declared: bool,
    pub dependencies: Vec<String>,
    pub lifecycle: Lifecycle,
}

/// A snapshot of every known extension, sorted by name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub entries: Vec<InventoryEntry>,
    /// Problems that made the snapshot partial.
    pub warnings: Vec<String>,
}

impl Inventory {
    /// Combine the linked catalog, the host's list and the marker store.
    ///
    /// Never fails: host or marker errors become warnings and the affected
    /// fields stay unknown.
    pub fn collect<H, M>(catalog: &ExtensionCatalog, host: &H, markers: &M, scope: ListScope) -> Self
    where
        H: HostApplication + ?Sized,
        M: MarkerStore + ?Sized,
    {
        let mut warnings = Vec::new();

        let statuses: BTreeMap<String, HostStatus> = match host.list(scope) {
            Ok(list) => list.into_iter().map(|e| (e.name, e.status)).collect(),
            Err(e) => {
                tracing::warn!("host list failed: {e}");
                warnings.push(format!("host status unavailable: {e}"));
                BTreeMap::new()
            }
        };

        let mut names: Vec<&str> = catalog
            .iter()
            .map(|e| e.name.as_str())
            .chain(statuses.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();

        let entries = names
            .into_iter()
            .map(|name| {
                let extension = catalog.get(name);
                let linked = extension.is_some();
                let host_status = statuses.get(name).copied();

                let seeded = if linked {
                    match markers.exists(name) {
                        Ok(seeded) => Some(seeded),
                        Err(e) => {
                            warnings.push(format!("marker lookup failed for {name}: {e}"));
                            None
                        }
                    }
                } else {
                    Some(false)
                };

                InventoryEntry {
                    name: name.to_string(),
                    key: extension.map(|e| e.key.clone()),
                    path: extension.map(|e| e.path.clone()),
                    linked,
                    host_status,
                    enabled: host_status.is_some_and(HostStatus::is_enabled),
                    seeded,
                    seeding_declared: extension.is_some_and(|e| e.manifest.seeding_enabled()),
                    dependencies: extension.map(|e| e.dependencies().to_vec()).unwrap_or_default(),
                    lifecycle: Lifecycle::observe(linked, host_status, seeded == Some(true)),
                }
            })
            .collect();

        Self { entries, warnings }
    }

    pub fn get(&self, name: &str) -> Option<&InventoryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Keep only extensions present under the extensions root.
    pub fn linked_only(mut self) -> Self {
        self.entries.retain(|e| e.linked);
        self
    }
}
