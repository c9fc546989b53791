//! Driving the host's extension lifecycle in dependency order.

use std::collections::{HashMap, HashSet};

use crate::dependency::InstallPlan;
use crate::error::{Error, Result};
use crate::host::{HostApplication, HostStatus, ListScope};

/// What happened to one plan entry during [`Installer::enable`].
#[derive(Debug)]
pub enum EnableOutcome {
    Enabled,
    /// The host already reported the extension as enabled.
    AlreadyEnabled,
    Failed(Error),
    /// Not attempted because a dependency failed or was itself blocked.
    Blocked { by: String },
}

impl EnableOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Enabled | Self::AlreadyEnabled)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::AlreadyEnabled => "already enabled",
            Self::Failed(_) => "failed",
            Self::Blocked { .. } => "blocked",
        }
    }
}

/// Per-entry outcomes of enabling a plan, in plan order.
#[derive(Debug, Default)]
pub struct EnableReport {
    entries: Vec<(String, EnableOutcome)>,
}

impl EnableReport {
    pub fn entries(&self) -> &[(String, EnableOutcome)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(String, EnableOutcome)> {
        self.entries
    }

    pub fn outcome(&self, name: &str) -> Option<&EnableOutcome> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|(_, o)| o.is_success())
    }

    /// The first failure in plan order.
    pub fn first_error(&self) -> Option<&Error> {
        self.entries.iter().find_map(|(_, o)| o.error())
    }
}

/// Drives enable/disable/uninstall through a [`HostApplication`].
pub struct Installer<H> {
    host: H,
    refreshed: bool,
}

impl<H: HostApplication> Installer<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            refreshed: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Ask the host to rescan its extensions root.
    pub fn refresh(&mut self) -> Result<()> {
        self.host.refresh()?;
        self.refreshed = true;
        Ok(())
    }

    /// Enable every plan entry in order.
    ///
    /// Refreshes first if this installer has not refreshed yet; that refresh
    /// failing is the only error returned. Per-entry failures are recorded
    /// in the report, dependents of a failed entry are reported as blocked,
    /// and independent entries still proceed.
    pub fn enable(&mut self, plan: &InstallPlan) -> Result<EnableReport> {
        if !self.refreshed {
            self.refresh()?;
        }

        let enabled: HashSet<String> = match self.host.list(ListScope::Local) {
            Ok(list) => list
                .into_iter()
                .filter(|e| e.status.is_enabled())
                .map(|e| e.name)
                .collect(),
            Err(e) => {
                tracing::warn!("cannot read host extension list, enabling every entry: {e}");
                HashSet::new()
            }
        };

        let mut report = EnableReport::default();
        let mut failed: HashSet<String> = HashSet::new();
        let mut blocked: HashMap<String, String> = HashMap::new();

        for name in plan {
            let outcome = if let Some(by) = blocked.get(name) {
                tracing::warn!(extension = %name, blocked_by = %by, "skipping enable");
                EnableOutcome::Blocked { by: by.clone() }
            } else if enabled.contains(name) {
                tracing::debug!(extension = %name, "already enabled");
                EnableOutcome::AlreadyEnabled
            } else {
                match self.host.enable(name) {
                    Ok(()) => {
                        tracing::info!(extension = %name, "extension enabled");
                        EnableOutcome::Enabled
                    }
                    Err(e) => {
                        tracing::warn!(extension = %name, "enable failed: {e}");
                        failed.insert(name.clone());
                        blocked = plan.blocked_by(&failed);
                        EnableOutcome::Failed(e)
                    }
                }
            };
            report.entries.push((name.clone(), outcome));
        }

        if !failed.is_empty() {
            // Leave the registry consistent with what actually got enabled.
            if let Err(e) = self.refresh() {
                tracing::warn!("refresh after failed enable also failed: {e}");
            }
        }
        Ok(report)
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        self.host.disable(name)?;
        tracing::info!(extension = name, "extension disabled");
        Ok(())
    }

    /// Uninstall `name`. Fails if the host reports it as enabled.
    pub fn uninstall(&self, name: &str) -> Result<()> {
        if self.host.status_of(name)? == Some(HostStatus::Enabled) {
            return Err(Error::HostOperation {
                operation: "uninstall",
                target: name.to_string(),
                message: "extension is enabled; disable it first".to_string(),
            });
        }
        self.host.uninstall(name)?;
        tracing::info!(extension = name, "extension uninstalled");
        Ok(())
    }
}
