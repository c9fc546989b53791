//! Making extension source trees visible under the host's extensions root.
//!
//! `<extensions_root>/<name>` is either a symlink to the source tree or a
//! copy of it. Copies carry a `.civikitchen-source` file recording where
//! they came from, so a later run can re-synchronise or remove them without
//! touching extensions that were installed by other means.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use kitchen_fs::KitchenPath;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, validate_name};
use crate::error::{Error, Result};

/// How the linker makes an extension visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStrategy {
    /// Symlink, falling back to a copy when the filesystem refuses links.
    #[default]
    Auto,
    /// Symlink only.
    Symlink,
    /// Always copy.
    Copy,
}

impl FromStr for LinkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "symlink" => Ok(Self::Symlink),
            "copy" => Ok(Self::Copy),
            other => Err(Error::Config(format!(
                "unknown link strategy '{other}' (expected auto, symlink or copy)"
            ))),
        }
    }
}

/// How a linked extension reaches its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMethod {
    Symlink,
    Copy,
    /// The source already lives at the destination.
    InPlace,
}

impl LinkMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Symlink => "symlink",
            Self::Copy => "copy",
            Self::InPlace => "in place",
        }
    }
}

/// What a `link` call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkOutcome {
    Created,
    AlreadyLinked,
    /// An existing copy was refreshed from its source.
    Resynced,
}

impl LinkOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "linked",
            Self::AlreadyLinked => "already linked",
            Self::Resynced => "resynced",
        }
    }
}

/// Result of linking one source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedExtension {
    pub name: String,
    pub key: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub method: LinkMethod,
    pub outcome: LinkOutcome,
}

/// Links extension source trees into an extensions root.
#[derive(Debug, Clone)]
pub struct Linker {
    extensions_root: PathBuf,
    strategy: LinkStrategy,
}

/// Inspections of a destination before `link` gives up on a contended path.
const PLACE_ATTEMPTS: usize = 3;

/// What currently occupies a destination path.
enum Occupant {
    Nothing,
    Symlink { target_exists: bool },
    Copy { source: PathBuf },
    Directory,
    File,
}

impl Linker {
    pub fn new(extensions_root: impl Into<PathBuf>, strategy: LinkStrategy) -> Self {
        Self {
            extensions_root: extensions_root.into(),
            strategy,
        }
    }

    pub fn extensions_root(&self) -> &Path {
        &self.extensions_root
    }

    pub fn strategy(&self) -> LinkStrategy {
        self.strategy
    }

    /// Where the extension named `name` lives once linked.
    pub fn destination(&self, name: &str) -> PathBuf {
        self.extensions_root.join(name)
    }

    /// Whether `name` is present under the extensions root.
    ///
    /// A dangling symlink does not count.
    pub fn is_linked(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.destination(name).is_dir()
    }

    /// Link the extension rooted at `source`.
    ///
    /// Idempotent: relinking the same source leaves the same end state.
    pub fn link(&self, source: &Path) -> Result<LinkedExtension> {
        let label = source.display().to_string();
        if !source.is_dir() {
            return Err(Error::link(label, "source directory does not exist"));
        }
        let (name, key) = catalog::identify(source)?;
        let source = dunce::canonicalize(source).map_err(|e| Error::link(&name, e.to_string()))?;
        let destination = self.destination(&name);

        std::fs::create_dir_all(&self.extensions_root).map_err(|e| {
            Error::link(
                &name,
                format!(
                    "cannot create extensions root {}: {e}",
                    self.extensions_root.display()
                ),
            )
        })?;

        for _ in 0..PLACE_ATTEMPTS {
            if let Some(result) = self.place(&name, &key, &source, &destination)? {
                tracing::info!(
                    extension = %result.name,
                    method = ?result.method,
                    outcome = ?result.outcome,
                    "extension linked"
                );
                return Ok(result);
            }
            tracing::debug!(extension = %name, "destination appeared while linking, inspecting again");
        }
        Err(Error::link(
            &name,
            format!("{} keeps changing while being linked", destination.display()),
        ))
    }

    /// Inspect `destination` and bring it in line with `source`. `None` means
    /// something else claimed the destination between inspection and creation.
    fn place(
        &self,
        name: &str,
        key: &str,
        source: &Path,
        destination: &Path,
    ) -> Result<Option<LinkedExtension>> {
        let linked = |method, outcome| LinkedExtension {
            name: name.to_string(),
            key: key.to_string(),
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            method,
            outcome,
        };

        let occupant = self.occupant(destination)?;
        let same_tree = dunce::canonicalize(destination).is_ok_and(|d| d == source);

        let result = match occupant {
            Occupant::Nothing => match self.create(name, source, destination)? {
                Some(method) => linked(method, LinkOutcome::Created),
                None => return Ok(None),
            },
            Occupant::Symlink { .. } if same_tree => linked(LinkMethod::Symlink, LinkOutcome::AlreadyLinked),
            Occupant::Symlink {
                target_exists: true,
            } => {
                return Err(Error::link(
                    name,
                    format!(
                        "{} is a symlink to a different source",
                        destination.display()
                    ),
                ));
            }
            Occupant::Symlink {
                target_exists: false,
            } => {
                tracing::debug!(extension = name, "replacing dangling symlink");
                match remove_symlink(destination) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(Error::link(name, e.to_string())),
                }
                match self.create(name, source, destination)? {
                    Some(method) => linked(method, LinkOutcome::Created),
                    None => return Ok(None),
                }
            }
            Occupant::Directory | Occupant::Copy { .. } if same_tree => {
                linked(LinkMethod::InPlace, LinkOutcome::AlreadyLinked)
            }
            Occupant::Copy { source: ref recorded } if recorded == source => {
                copy_tree(source, destination).map_err(|e| Error::link(name, e))?;
                linked(LinkMethod::Copy, LinkOutcome::Resynced)
            }
            Occupant::Copy { source: recorded } => {
                return Err(Error::link(
                    name,
                    format!(
                        "{} is a copy of {}, not of this source",
                        destination.display(),
                        recorded.display()
                    ),
                ));
            }
            Occupant::Directory | Occupant::File => {
                return Err(Error::link(
                    name,
                    format!(
                        "{} already exists and was not linked by civikitchen",
                        destination.display()
                    ),
                ));
            }
        };
        Ok(Some(result))
    }

    /// Link several source trees concurrently. Results are in input order.
    ///
    /// Sources that identify as the same extension are linked one after the
    /// other on a single thread, so only the first of them creates the
    /// destination.
    pub fn link_all(&self, sources: &[PathBuf]) -> Vec<Result<LinkedExtension>> {
        let groups = group_by_name(sources);
        let mut results: Vec<Option<Result<LinkedExtension>>> = sources.iter().map(|_| None).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = groups
                .iter()
                .map(|group| {
                    scope.spawn(move || {
                        group
                            .iter()
                            .map(|&i| (i, self.link(&sources[i])))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for (handle, group) in handles.into_iter().zip(&groups) {
                match handle.join() {
                    Ok(linked) => {
                        for (i, result) in linked {
                            results[i] = Some(result);
                        }
                    }
                    Err(_) => {
                        for &i in group {
                            results[i] = Some(Err(Error::link(
                                sources[i].display().to_string(),
                                "linking thread panicked",
                            )));
                        }
                    }
                }
            }
        });

        results
            .into_iter()
            .zip(sources)
            .map(|(result, source)| {
                result.unwrap_or_else(|| Err(Error::link(source.display().to_string(), "not linked")))
            })
            .collect()
    }

    /// Remove the link or copied tree for `name`. Returns `false` if
    /// nothing was there.
    pub fn unlink(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let destination = self.destination(name);
        match self.occupant(&destination)? {
            Occupant::Nothing => Ok(false),
            Occupant::Symlink { .. } => {
                remove_symlink(&destination).map_err(|e| Error::link(name, e.to_string()))?;
                tracing::info!(extension = name, "extension unlinked");
                Ok(true)
            }
            Occupant::Copy { .. } => {
                std::fs::remove_dir_all(&destination).map_err(|e| Error::link(name, e.to_string()))?;
                tracing::info!(extension = name, "extension copy removed");
                Ok(true)
            }
            Occupant::Directory | Occupant::File => Err(Error::link(
                name,
                format!(
                    "{} was not linked by civikitchen; refusing to remove it",
                    destination.display()
                ),
            )),
        }
    }

    fn occupant(&self, destination: &Path) -> Result<Occupant> {
        let meta = match std::fs::symlink_metadata(destination) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Occupant::Nothing),
            Err(e) => return Err(kitchen_fs::Error::io(destination, e).into()),
        };

        if meta.file_type().is_symlink() {
            return Ok(Occupant::Symlink {
                target_exists: destination.exists(),
            });
        }
        if !meta.is_dir() {
            return Ok(Occupant::File);
        }
        let recorded = kitchen_fs::io::read_text_if_exists(&destination.join(KitchenPath::CopySource.as_str()))?;
        Ok(match recorded {
            Some(text) => Occupant::Copy {
                source: PathBuf::from(text.trim()),
            },
            None => Occupant::Directory,
        })
    }

    /// Create the link or copy. `None` when the destination already exists,
    /// which is never a reason to fall back to copying.
    fn create(&self, name: &str, source: &Path, destination: &Path) -> Result<Option<LinkMethod>> {
        match self.strategy {
            LinkStrategy::Symlink => match create_symlink(source, destination) {
                Ok(()) => Ok(Some(LinkMethod::Symlink)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
                Err(e) => Err(Error::link(name, format!("cannot create symlink: {e}"))),
            },
            LinkStrategy::Copy => {
                copy_tree(source, destination).map_err(|e| Error::link(name, e))?;
                Ok(Some(LinkMethod::Copy))
            }
            LinkStrategy::Auto => match create_symlink(source, destination) {
                Ok(()) => Ok(Some(LinkMethod::Symlink)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
                Err(e) => {
                    tracing::warn!(extension = name, "symlink refused ({e}), copying instead");
                    copy_tree(source, destination).map_err(|e| Error::link(name, e))?;
                    Ok(Some(LinkMethod::Copy))
                }
            },
        }
    }
}

/// Indices of `sources` grouped by the extension name they identify as,
/// in order of first appearance.
fn group_by_name(sources: &[PathBuf]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (i, source) in sources.iter().enumerate() {
        let Ok((name, _)) = catalog::identify(source) else {
            groups.push(vec![i]);
            continue;
        };
        match by_name.entry(name) {
            Entry::Occupied(entry) => groups[*entry.get()].push(i),
            Entry::Vacant(entry) => {
                entry.insert(groups.len());
                groups.push(vec![i]);
            }
        }
    }
    groups
}

/// Copy `source` over `destination`, overwriting files that exist in both,
/// and record the source path in the copy.
///
/// Refuses a destination that resolves to the source or into it.
fn copy_tree(source: &Path, destination: &Path) -> std::result::Result<(), String> {
    let source = dunce::canonicalize(source).map_err(|e| format!("{}: {e}", source.display()))?;
    if let Ok(resolved) = dunce::canonicalize(destination)
        && resolved.starts_with(&source)
    {
        return Err(format!(
            "{} resolves into the source tree {}; refusing to copy over it",
            destination.display(),
            source.display()
        ));
    }
    let source = source.as_path();
    std::fs::create_dir_all(destination).map_err(|e| format!("{}: {e}", destination.display()))?;

    for entry in walkdir::WalkDir::new(source).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| e.to_string())?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| e.to_string())?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| format!("{}: {e}", target.display()))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| format!("{}: {e}", target.display()))?;
        }
    }

    let record = destination.join(KitchenPath::CopySource.as_str());
    kitchen_fs::io::write_text(&record, &format!("{}\n", source.display())).map_err(|e| e.to_string())
}

#[cfg(unix)]
fn create_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, destination)
}

#[cfg(windows)]
fn create_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(source, destination)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Path, _destination: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn remove_symlink(path: &Path) -> io::Result<()> {
    // Directory symlinks on Windows must be removed as directories.
    std::fs::remove_file(path).or_else(|_| std::fs::remove_dir(path))
}
