//! Builder for extension source trees.

use std::fs;
use std::path::{Path, PathBuf};

/// An extension directory under construction.
///
/// ```rust,no_run
/// use kitchen_test_utils::ExtensionFixture;
///
/// let dir = ExtensionFixture::new("/tmp/sources", "org.example.target")
///     .depends_on("org.example.base")
///     .seed_script("echo seeded")
///     .create();
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionFixture {
    dir: PathBuf,
    name: String,
    dependencies: Vec<String>,
    seed_body: Option<String>,
    seeding_enabled: bool,
    run_once: bool,
    info_file: Option<String>,
    raw_manifest: Option<String>,
    no_manifest: bool,
}

impl ExtensionFixture {
    /// Describe an extension named `name` created under `parent`.
    pub fn new(parent: impl AsRef<Path>, name: &str) -> Self {
        Self {
            dir: parent.as_ref().join(name),
            name: name.to_string(),
            dependencies: Vec::new(),
            seed_body: None,
            seeding_enabled: true,
            run_once: true,
            info_file: None,
            raw_manifest: None,
            no_manifest: false,
        }
    }

    pub fn depends_on(mut self, name: &str) -> Self {
        self.dependencies.push(name.to_string());
        self
    }

    /// Declare seeding with `scripts/seed.sh` containing `body`.
    pub fn seed_script(mut self, body: &str) -> Self {
        self.seed_body = Some(body.to_string());
        self
    }

    /// Seed script that appends the extension name to `log` on every run.
    pub fn counting_seed(self, log: &Path) -> Self {
        let body = format!("echo \"$CIVIKITCHEN_EXTENSION\" >> '{}'", log.display());
        self.seed_script(&body)
    }

    pub fn run_once(mut self, run_once: bool) -> Self {
        self.run_once = run_once;
        self
    }

    /// Declare seeding with `enabled: false`.
    pub fn seeding_disabled(mut self) -> Self {
        self.seeding_enabled = false;
        self
    }

    /// Write an `info.xml` with `<file>` set to `file`.
    pub fn info_xml(mut self, file: &str) -> Self {
        self.info_file = Some(file.to_string());
        self
    }

    /// Write `content` verbatim as `civikitchen.json`.
    pub fn raw_manifest(mut self, content: &str) -> Self {
        self.raw_manifest = Some(content.to_string());
        self
    }

    /// Do not write `civikitchen.json` (an `info.xml` is written instead).
    pub fn without_manifest(mut self) -> Self {
        self.no_manifest = true;
        self
    }

    /// Write the extension to disk and return its directory.
    ///
    /// # Panics
    /// Panics if the filesystem operations fail.
    pub fn create(self) -> PathBuf {
        fs::create_dir_all(&self.dir)
            .unwrap_or_else(|e| panic!("ExtensionFixture: failed to create {}: {e}", self.dir.display()));

        // Without a manifest the directory needs info.xml to count as an extension.
        let info_file = match (&self.info_file, self.no_manifest) {
            (Some(file), _) => Some(file.clone()),
            (None, true) => self.name.rsplit('.').next().map(str::to_string),
            (None, false) => None,
        };
        if let Some(file) = info_file {
            let xml = format!(
                "<?xml version=\"1.0\"?>\n<extension key=\"{}\" type=\"module\">\n  <file>{file}</file>\n  <name>{}</name>\n</extension>\n",
                self.name, self.name
            );
            write(&self.dir.join("info.xml"), &xml);
        }

        if let Some(ref body) = self.seed_body {
            fs::create_dir_all(self.dir.join("scripts")).unwrap();
            write(&self.dir.join("scripts/seed.sh"), &format!("#!/bin/sh\n{body}\n"));
        }

        if self.no_manifest {
            return self.dir;
        }

        let manifest = match self.raw_manifest {
            Some(ref raw) => raw.clone(),
            None => {
                let mut value = serde_json::json!({ "dependencies": self.dependencies });
                if self.seed_body.is_some() || !self.seeding_enabled {
                    value["seeding"] = serde_json::json!({
                        "enabled": self.seeding_enabled,
                        "script": "scripts/seed.sh",
                        "runOnce": self.run_once,
                    });
                }
                serde_json::to_string_pretty(&value).unwrap()
            }
        };
        write(&self.dir.join("civikitchen.json"), &manifest);
        self.dir
    }
}

fn write(path: &Path, content: &str) {
    fs::write(path, content).unwrap_or_else(|e| panic!("ExtensionFixture: failed to write {}: {e}", path.display()));
}

/// Number of lines equal to `name` in a log written by
/// [`ExtensionFixture::counting_seed`].
pub fn seed_runs(log: &Path, name: &str) -> usize {
    fs::read_to_string(log)
        .map(|content| content.lines().filter(|line| line.trim() == name).count())
        .unwrap_or(0)
}
