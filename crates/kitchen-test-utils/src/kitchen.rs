//! [`TestKitchen`]: a complete provisioning sandbox in a temporary directory.
//!
//! Layout:
//!
//! ```text
//! <root>/sources/        extension source trees
//! <root>/ext/            extensions root
//! <root>/site/           site directory, `cv` runs here
//! <root>/state/          fake cv registry, call log and injected failures
//! <root>/bin/cv          fake cv script
//! <root>/seed-runs.log   written by counting seed scripts
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::extension::{self, ExtensionFixture};

/// A POSIX shell stand-in for `cv` that keeps an extension registry in a
/// text file (`<key> <status>` per line).
const FAKE_CV: &str = r#"#!/bin/sh
STATE_DIR='@STATE_DIR@'
EXT_DIR='@EXT_DIR@'
STATE="$STATE_DIR/registry"
echo "$*" >> "$STATE_DIR/calls.log"
touch "$STATE"

status_of() { awk -v k="$1" '$1 == k { print $2 }' "$STATE"; }
set_status() {
  grep -v "^$1 " "$STATE" > "$STATE.tmp"
  echo "$1 $2" >> "$STATE.tmp"
  mv "$STATE.tmp" "$STATE"
}
fail_if_injected() {
  if [ -f "$STATE_DIR/fail-$1-$2" ]; then
    cat "$STATE_DIR/fail-$1-$2" >&2
    exit 1
  fi
}

case "$1" in
  flush)
    fail_if_injected flush all
    ;;
  ext:list)
    if [ "$2" = "--refresh" ]; then
      fail_if_injected refresh all
      for d in "$EXT_DIR"/*/; do
        [ -d "$d" ] || continue
        k=$(basename "$d")
        [ -n "$(status_of "$k")" ] || set_status "$k" uninstalled
      done
      exit 0
    fi
    fail_if_injected list all
    printf '['
    sep=''
    while read -r k s; do
      [ -n "$k" ] || continue
      printf '%s{"key":"%s","status":"%s"}' "$sep" "$k" "$s"
      sep=','
    done < "$STATE"
    printf ']\n'
    ;;
  ext:enable)
    fail_if_injected enable "$2"
    if [ -z "$(status_of "$2")" ]; then
      echo "Error: Unknown extension: $2" >&2
      exit 1
    fi
    set_status "$2" installed
    ;;
  ext:disable)
    fail_if_injected disable "$2"
    set_status "$2" disabled
    ;;
  ext:uninstall)
    fail_if_injected uninstall "$2"
    if [ "$(status_of "$2")" = "installed" ]; then
      echo "Error: $2 is enabled" >&2
      exit 1
    fi
    set_status "$2" uninstalled
    ;;
  *)
    echo "unsupported: $*" >&2
    exit 2
    ;;
esac
"#;

/// Sources, extensions root and a fake `cv` under one temporary directory.
pub struct TestKitchen {
    temp_dir: TempDir,
}

impl Default for TestKitchen {
    fn default() -> Self {
        Self::new()
    }
}

impl TestKitchen {
    /// Create the directory layout and install the fake `cv`.
    pub fn new() -> Self {
        let kitchen = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        for dir in [
            kitchen.sources_dir(),
            kitchen.extensions_root(),
            kitchen.site_dir(),
            kitchen.state_dir(),
            kitchen.root().join("bin"),
        ] {
            fs::create_dir_all(&dir).unwrap();
        }
        kitchen.install_fake_cv();
        kitchen
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root().join("sources")
    }

    pub fn extensions_root(&self) -> PathBuf {
        self.root().join("ext")
    }

    pub fn site_dir(&self) -> PathBuf {
        self.root().join("site")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root().join("state")
    }

    pub fn cv_path(&self) -> PathBuf {
        self.root().join("bin").join("cv")
    }

    pub fn seed_log(&self) -> PathBuf {
        self.root().join("seed-runs.log")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("civikitchen.toml")
    }

    /// Start describing an extension source tree under [`sources_dir`](Self::sources_dir).
    pub fn extension(&self, name: &str) -> ExtensionFixture {
        ExtensionFixture::new(self.sources_dir(), name)
    }

    /// An extension whose seed script is counted in [`seed_log`](Self::seed_log).
    pub fn counted_extension(&self, name: &str) -> ExtensionFixture {
        self.extension(name).counting_seed(&self.seed_log())
    }

    /// How many times the counting seed script of `name` ran.
    pub fn seed_runs(&self, name: &str) -> usize {
        extension::seed_runs(&self.seed_log(), name)
    }

    /// Write `civikitchen.toml` pointing at this kitchen, followed by `extra`.
    pub fn write_config(&self, extra: &str) -> PathBuf {
        let config = format!(
            "extensions_root = '{}'\nsources = ['{}']\n{extra}\n[host]\nprogram = '{}'\nsite_dir = '{}'\ntimeout_secs = 30\n\n[seeding]\ninterpreter = 'sh'\ntimeout_secs = 30\n",
            self.extensions_root().display(),
            self.sources_dir().display(),
            self.cv_path().display(),
            self.site_dir().display(),
        );
        let path = self.config_path();
        fs::write(&path, config).unwrap();
        path
    }

    fn install_fake_cv(&self) {
        let script = FAKE_CV
            .replace("@STATE_DIR@", &self.state_dir().display().to_string())
            .replace("@EXT_DIR@", &self.extensions_root().display().to_string());
        let path = self.cv_path();
        fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    /// Make the fake `cv` fail `operation` (`enable`, `disable`, `uninstall`,
    /// or `refresh`/`flush`/`list` with target `all`) with `message`.
    pub fn fail_host(&self, operation: &str, target: &str, message: &str) {
        fs::write(self.state_dir().join(format!("fail-{operation}-{target}")), message).unwrap();
    }

    /// Pre-register an extension in the fake registry.
    pub fn set_host_status(&self, name: &str, status: &str) {
        let registry = self.state_dir().join("registry");
        let mut lines: Vec<String> = fs::read_to_string(&registry)
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.starts_with(&format!("{name} ")))
            .map(str::to_string)
            .collect();
        lines.push(format!("{name} {status}"));
        fs::write(registry, lines.join("\n") + "\n").unwrap();
    }

    /// Status string the fake registry holds for `name`.
    pub fn host_status(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.state_dir().join("registry"))
            .ok()?
            .lines()
            .find_map(|line| {
                let (key, status) = line.split_once(' ')?;
                (key == name).then(|| status.to_string())
            })
    }

    /// Arguments of every fake `cv` invocation, in order.
    pub fn host_calls(&self) -> Vec<String> {
        fs::read_to_string(self.state_dir().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Whether the marker file exists for linked extension `name`.
    pub fn marker_exists(&self, name: &str) -> bool {
        self.extensions_root().join(name).join(".civicrm-seeded").is_file()
    }
}
