//! Running seed scripts exactly once per extension.
//!
//! A seed script is run when the extension's manifest declares an enabled
//! `seeding` directive. For `runOnce` scripts a marker written after a
//! successful run suppresses later runs until the marker is reset or the
//! seeder is forced.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::catalog::Extension;
use crate::error::{Error, Result};
use crate::exec::{self, ExecError};
use crate::marker::MarkerStore;

/// Executes one seed script for an extension.
pub trait ScriptRunner {
    /// Run `script`. Any failure is an [`Error::SeedExecution`].
    fn run(&self, extension: &Extension, script: &Path) -> Result<()>;
}

impl<R: ScriptRunner + ?Sized> ScriptRunner for &R {
    fn run(&self, extension: &Extension, script: &Path) -> Result<()> {
        (**self).run(extension, script)
    }
}

/// Runs seed scripts through an interpreter (`bash` by default) with the
/// extension directory as working directory.
#[derive(Debug, Clone)]
pub struct ShellScriptRunner {
    interpreter: String,
    timeout: Duration,
}

impl ShellScriptRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }
}

impl ScriptRunner for ShellScriptRunner {
    fn run(&self, extension: &Extension, script: &Path) -> Result<()> {
        let mut cmd = exec::script_command(&self.interpreter, script, &extension.path);
        cmd.env("CIVIKITCHEN_EXTENSION", &extension.name)
            .env("CIVIKITCHEN_EXTENSION_KEY", &extension.key)
            .env("CIVIKITCHEN_EXTENSION_DIR", &extension.path);

        tracing::info!(extension = %extension.name, script = %script.display(), "running seed script");
        let output = exec::run(cmd, self.timeout).map_err(|e| match e {
            ExecError::Timeout(t) => Error::seed(&extension.name, format!("timed out after {}s", t.as_secs())),
            other => Error::seed(&extension.name, other.to_string()),
        })?;

        if !output.success() {
            return Err(Error::seed(&extension.name, output.failure_text()));
        }
        Ok(())
    }
}

/// Result of a successful `seed` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedOutcome {
    /// The script ran and the marker was written.
    Seeded,
    /// The manifest declares no seeding.
    NotDeclared,
    /// Seeding is declared with `enabled: false`.
    Disabled,
    /// `runOnce` and a marker already exists.
    AlreadySeeded,
}

impl SeedOutcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Seeded => "seeded",
            Self::NotDeclared => "no seeding declared",
            Self::Disabled => "seeding disabled",
            Self::AlreadySeeded => "already seeded",
        }
    }

    pub fn ran(self) -> bool {
        self == Self::Seeded
    }
}

/// Which markers to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    One(String),
    All,
}

pub struct Seeder<M, R> {
    markers: M,
    runner: R,
    force: bool,
}

impl<M: MarkerStore, R: ScriptRunner> Seeder<M, R> {
    pub fn new(markers: M, runner: R) -> Self {
        Self {
            markers,
            runner,
            force: false,
        }
    }

    /// Ignore existing markers.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn markers(&self) -> &M {
        &self.markers
    }

    pub fn seed(&self, extension: &Extension) -> Result<SeedOutcome> {
        let name = extension.name.as_str();
        let seeding = match extension.manifest.seeding {
            None => return Ok(SeedOutcome::NotDeclared),
            Some(ref s) if !s.enabled => return Ok(SeedOutcome::Disabled),
            Some(ref s) => s,
        };

        if seeding.run_once && !self.force && self.markers.exists(name)? {
            tracing::debug!(extension = name, "seed marker present, skipping");
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let script = extension.path.join(&seeding.script);
        if !script.is_file() {
            return Err(Error::seed(
                name,
                format!("seed script not found: {}", script.display()),
            ));
        }

        self.runner.run(extension, &script)?;

        self.markers
            .set(name)
            .map_err(|e| Error::seed(name, format!("script succeeded but the marker was not written: {e}")))?;
        tracing::info!(extension = name, "extension seeded");
        Ok(SeedOutcome::Seeded)
    }

    /// Seed each extension in order. A failure affects only its own entry.
    pub fn seed_all<'a, I>(&self, extensions: I) -> Vec<(String, Result<SeedOutcome>)>
    where
        I: IntoIterator<Item = &'a Extension>,
    {
        extensions
            .into_iter()
            .map(|ext| {
                let result = self.seed(ext);
                if let Err(ref e) = result {
                    tracing::warn!(extension = %ext.name, "{e}");
                }
                (ext.name.clone(), result)
            })
            .collect()
    }

    /// Delete markers. Returns the names whose marker was actually removed.
    pub fn reset_markers(&self, target: &ResetTarget) -> Result<Vec<String>> {
        let names = match target {
            ResetTarget::One(name) => vec![name.clone()],
            ResetTarget::All => self.markers.list()?,
        };
        let mut cleared = Vec::new();
        for name in names {
            if self.markers.clear(&name)? {
                cleared.push(name);
            }
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ExtensionManifest, ManifestStatus, Seeding};
    use crate::marker::MemoryMarkerStore;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Records invocations and fails for names listed in `failing`.
    #[derive(Default)]
    struct RecordingRunner {
        runs: RefCell<Vec<String>>,
        failing: Vec<String>,
    }

    impl ScriptRunner for RecordingRunner {
        fn run(&self, extension: &Extension, _script: &Path) -> Result<()> {
            self.runs.borrow_mut().push(extension.name.clone());
            if self.failing.contains(&extension.name) {
                return Err(Error::seed(&extension.name, "exit code 1: boom"));
            }
            Ok(())
        }
    }

    fn extension(dir: &Path, name: &str, seeding: Option<Seeding>) -> Extension {
        let path = dir.join(name);
        std::fs::create_dir_all(path.join("scripts")).unwrap();
        std::fs::write(path.join("scripts/seed.sh"), "true\n").unwrap();
        Extension {
            name: name.to_string(),
            key: name.rsplit('.').next().unwrap().to_string(),
            path,
            manifest: ExtensionManifest {
                seeding,
                dependencies: Vec::new(),
            },
            manifest_status: ManifestStatus::Loaded,
        }
    }

    fn seeding(enabled: bool, run_once: bool) -> Option<Seeding> {
        Some(Seeding {
            enabled,
            script: "scripts/seed.sh".to_string(),
            run_once,
        })
    }

    #[test]
    fn test_run_once_executes_once() {
        let temp = TempDir::new().unwrap();
        let ext = extension(temp.path(), "org.example.base", seeding(true, true));
        let runner = RecordingRunner::default();
        let seeder = Seeder::new(MemoryMarkerStore::new(), &runner);

        assert_eq!(seeder.seed(&ext).unwrap(), SeedOutcome::Seeded);
        assert_eq!(seeder.seed(&ext).unwrap(), SeedOutcome::AlreadySeeded);
        assert_eq!(runner.runs.borrow().len(), 1);
    }

    #[test]
    fn test_run_once_with_directory_named_differently_from_key() {
        let temp = TempDir::new().unwrap();
        let mut ext = extension(temp.path(), "banking", seeding(true, true));
        std::fs::write(
            ext.path.join("info.xml"),
            r#"<extension key="org.project60.banking" type="module"></extension>"#,
        )
        .unwrap();
        ext.name = "org.project60.banking".to_string();
        let runner = RecordingRunner::default();
        let seeder = Seeder::new(crate::marker::FileMarkerStore::new(temp.path()), &runner);

        assert_eq!(seeder.seed(&ext).unwrap(), SeedOutcome::Seeded);
        assert_eq!(seeder.seed(&ext).unwrap(), SeedOutcome::AlreadySeeded);
        assert_eq!(runner.runs.borrow().len(), 1);
        assert!(ext.path.join(".civicrm-seeded").is_file());
    }

    #[test]
    fn test_run_always_executes_every_time() {
        let temp = TempDir::new().unwrap();
        let ext = extension(temp.path(), "a", seeding(true, false));
        let runner = RecordingRunner::default();
        let seeder = Seeder::new(MemoryMarkerStore::new(), &runner);

        seeder.seed(&ext).unwrap();
        seeder.seed(&ext).unwrap();
        assert_eq!(runner.runs.borrow().len(), 2);
    }

    #[test]
    fn test_disabled_and_absent_never_run() {
        let temp = TempDir::new().unwrap();
        let disabled = extension(temp.path(), "a", seeding(false, true));
        let absent = extension(temp.path(), "b", None);
        let runner = RecordingRunner::default();
        let markers = MemoryMarkerStore::new();
        let seeder = Seeder::new(&markers, &runner);

        assert_eq!(seeder.seed(&disabled).unwrap(), SeedOutcome::Disabled);
        assert_eq!(seeder.seed(&absent).unwrap(), SeedOutcome::NotDeclared);
        assert!(runner.runs.borrow().is_empty());
        assert!(markers.list().unwrap().is_empty());
    }

    #[test]
    fn test_failure_writes_no_marker() {
        let temp = TempDir::new().unwrap();
        let ext = extension(temp.path(), "a", seeding(true, true));
        let runner = RecordingRunner {
            failing: vec!["a".to_string()],
            ..Default::default()
        };
        let markers = MemoryMarkerStore::new();
        let seeder = Seeder::new(&markers, &runner);

        let err = seeder.seed(&ext).unwrap_err();

        assert_eq!(err.exit_code(), 7);
        assert!(!markers.exists("a").unwrap());
    }

    #[test]
    fn test_missing_script() {
        let temp = TempDir::new().unwrap();
        let mut ext = extension(temp.path(), "a", seeding(true, true));
        ext.manifest.seeding.as_mut().unwrap().script = "scripts/nope.sh".into();
        let seeder = Seeder::new(MemoryMarkerStore::new(), RecordingRunner::default());

        let err = seeder.seed(&ext).unwrap_err();
        assert!(err.to_string().contains("seed script not found"));
    }

    #[test]
    fn test_force_and_reset() {
        let temp = TempDir::new().unwrap();
        let ext = extension(temp.path(), "a", seeding(true, true));
        let runner = RecordingRunner::default();
        let markers = MemoryMarkerStore::new();

        Seeder::new(&markers, &runner).seed(&ext).unwrap();
        let forced = Seeder::new(&markers, &runner).force(true);
        assert_eq!(forced.seed(&ext).unwrap(), SeedOutcome::Seeded);

        let seeder = Seeder::new(&markers, &runner);
        assert_eq!(seeder.reset_markers(&ResetTarget::One("a".into())).unwrap(), vec!["a"]);
        assert!(seeder.reset_markers(&ResetTarget::One("a".into())).unwrap().is_empty());
        assert_eq!(seeder.seed(&ext).unwrap(), SeedOutcome::Seeded);
        assert_eq!(runner.runs.borrow().len(), 3);
    }

    #[test]
    fn test_reset_all() {
        let markers = MemoryMarkerStore::new();
        markers.set("a").unwrap();
        markers.set("b").unwrap();
        let seeder = Seeder::new(&markers, RecordingRunner::default());

        assert_eq!(seeder.reset_markers(&ResetTarget::All).unwrap(), vec!["a", "b"]);
        assert!(markers.list().unwrap().is_empty());
    }

    #[test]
    fn test_seed_all_isolates_failures() {
        let temp = TempDir::new().unwrap();
        let e1 = extension(temp.path(), "e1", seeding(true, true));
        let e2 = extension(temp.path(), "e2", seeding(true, true));
        let runner = RecordingRunner {
            failing: vec!["e1".to_string()],
            ..Default::default()
        };
        let markers = MemoryMarkerStore::new();
        let seeder = Seeder::new(&markers, &runner);

        let results = seeder.seed_all([&e1, &e2]);

        assert!(results[0].1.is_err());
        assert_eq!(*results[1].1.as_ref().unwrap(), SeedOutcome::Seeded);
        assert_eq!(markers.list().unwrap(), vec!["e2"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_env_and_cwd() {
        let temp = TempDir::new().unwrap();
        let ext = extension(temp.path(), "org.example.base", seeding(true, true));
        std::fs::write(
            ext.path.join("scripts/seed.sh"),
            "echo \"$CIVIKITCHEN_EXTENSION $CIVIKITCHEN_EXTENSION_KEY\" > seeded.txt\n",
        )
        .unwrap();
        let runner = ShellScriptRunner::new("sh", Duration::from_secs(10));

        runner.run(&ext, &ext.path.join("scripts/seed.sh")).unwrap();

        let written = std::fs::read_to_string(ext.path.join("seeded.txt")).unwrap();
        assert_eq!(written.trim(), "org.example.base base");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_failure_keeps_stderr() {
        let temp = TempDir::new().unwrap();
        let ext = extension(temp.path(), "a", seeding(true, true));
        let script: PathBuf = ext.path.join("scripts/seed.sh");
        std::fs::write(&script, "echo 'contact import failed' >&2\nexit 2\n").unwrap();

        let err = ShellScriptRunner::new("sh", Duration::from_secs(10))
            .run(&ext, &script)
            .unwrap_err();

        assert!(err.to_string().contains("exit code 2: contact import failed"), "{err}");
    }
}
