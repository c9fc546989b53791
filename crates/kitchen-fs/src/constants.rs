//! Well-known file names used by the provisioning system.

use std::path::Path;

/// Standard files the provisioning system reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitchenPath {
    /// Per-extension seeding/dependency manifest at the extension root
    Manifest,
    /// Idempotence sentinel written after a one-shot seed completes
    SeedMarker,
    /// Extension metadata generated by civix
    InfoXml,
    /// Provisioning configuration file
    ConfigFile,
    /// Source path recorded inside a copied (not symlinked) extension tree
    CopySource,
}

impl KitchenPath {
    /// Get the string representation of the path.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "civikitchen.json",
            Self::SeedMarker => ".civicrm-seeded",
            Self::InfoXml => "info.xml",
            Self::ConfigFile => "civikitchen.toml",
            Self::CopySource => ".civikitchen-source",
        }
    }
}

impl AsRef<Path> for KitchenPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for KitchenPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for KitchenPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
