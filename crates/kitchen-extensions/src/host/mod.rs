//! Host application port.
//!
//! The host (CiviCRM behind its `cv` command-line tool) owns the extension
//! registry. Provisioning only observes and drives it through
//! [`HostApplication`]: [`CvHost`] shells out to `cv`, [`MemoryHost`] is an
//! in-memory stand-in with the same lifecycle rules.

mod cv;
mod memory;

use serde::Serialize;

pub use cv::CvHost;
pub use memory::MemoryHost;

use crate::error::Result;

/// Which extensions `list` should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListScope {
    /// Extensions present in the local extensions root.
    #[default]
    Local,
    /// Local extensions plus the host's remote catalog.
    All,
}

/// Extension status as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    /// Installed and enabled (`installed` in `cv` output).
    Enabled,
    /// Installed but disabled.
    Disabled,
    /// Known to the host but not installed.
    Uninstalled,
    /// Registered as installed or disabled, but its code is gone.
    Missing,
    /// Any status string this tool does not understand.
    Unknown,
}

impl HostStatus {
    /// Map a `cv ext:list` status string.
    pub fn from_cv(status: &str) -> Self {
        match status.trim() {
            "installed" | "enabled" => Self::Enabled,
            "disabled" => Self::Disabled,
            "uninstalled" | "" => Self::Uninstalled,
            "installed-missing" | "disabled-missing" => Self::Missing,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Uninstalled => "uninstalled",
            Self::Missing => "missing",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

impl std::fmt::Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the host's extension list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostExtension {
    pub name: String,
    pub status: HostStatus,
}

/// Operations provisioning needs from the host application.
///
/// Every call blocks until the host finishes or its timeout elapses; a
/// timeout is reported as [`Error::HostTimeout`](crate::Error::HostTimeout).
pub trait HostApplication {
    /// List extensions known to the host.
    fn list(&self, scope: ListScope) -> Result<Vec<HostExtension>>;

    /// Rescan the extensions root so newly linked code becomes visible.
    fn refresh(&self) -> Result<()>;

    /// Install (if needed) and enable an extension.
    fn enable(&self, name: &str) -> Result<()>;

    /// Disable an enabled extension.
    fn disable(&self, name: &str) -> Result<()>;

    /// Uninstall a disabled extension.
    fn uninstall(&self, name: &str) -> Result<()>;

    /// Status of one extension, `None` if the host does not know it.
    fn status_of(&self, name: &str) -> Result<Option<HostStatus>> {
        Ok(self
            .list(ListScope::Local)?
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.status))
    }
}

impl<H: HostApplication + ?Sized> HostApplication for &H {
    fn list(&self, scope: ListScope) -> Result<Vec<HostExtension>> {
        (**self).list(scope)
    }

    fn refresh(&self) -> Result<()> {
        (**self).refresh()
    }

    fn enable(&self, name: &str) -> Result<()> {
        (**self).enable(name)
    }

    fn disable(&self, name: &str) -> Result<()> {
        (**self).disable(name)
    }

    fn uninstall(&self, name: &str) -> Result<()> {
        (**self).uninstall(name)
    }

    fn status_of(&self, name: &str) -> Result<Option<HostStatus>> {
        (**self).status_of(name)
    }
}
