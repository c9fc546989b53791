//! `cv` command adapter for the host application port.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::{HostApplication, HostExtension, HostStatus, ListScope};
use crate::config::HostConfig;
use crate::error::{Error, Result};
use crate::exec::{self, CapturedOutput, ExecError};

/// Drives the host through `cv ext:*` commands.
#[derive(Debug, Clone)]
pub struct CvHost {
    program: String,
    site_dir: Option<PathBuf>,
    exec_prefix: Vec<String>,
    timeout: Duration,
    flush_on_refresh: bool,
}

#[derive(Debug, Deserialize)]
struct CvRow {
    key: String,
    #[serde(default)]
    status: String,
}

impl CvHost {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            program: config.program.clone(),
            site_dir: config.site_dir.clone(),
            exec_prefix: config.exec_prefix.clone(),
            timeout: config.timeout(),
            flush_on_refresh: config.flush_on_refresh,
        }
    }

    fn cv(&self, operation: &'static str, target: &str, args: &[&str]) -> Result<CapturedOutput> {
        let mut cmd = exec::command(&self.exec_prefix, &self.program, args);
        // With a prefix (docker exec, ssh, ...) the working directory belongs
        // to the remote side and must be part of the prefix itself.
        if self.exec_prefix.is_empty() {
            if let Some(ref dir) = self.site_dir {
                if !dir.is_dir() {
                    return Err(Error::HostOperation {
                        operation,
                        target: target.to_string(),
                        message: format!("site directory {} does not exist", dir.display()),
                    });
                }
                cmd.current_dir(dir);
            }
        }

        tracing::debug!(operation, target, ?args, "running cv");
        let output = exec::run(cmd, self.timeout).map_err(|e| match e {
            ExecError::Timeout(timeout) => Error::HostTimeout {
                operation,
                target: target.to_string(),
                timeout,
            },
            other => Error::HostOperation {
                operation,
                target: target.to_string(),
                message: other.to_string(),
            },
        })?;

        if !output.success() {
            return Err(Error::HostOperation {
                operation,
                target: target.to_string(),
                message: output.failure_text(),
            });
        }
        Ok(output)
    }
}

/// Parse `cv ext:list --out=json` output.
///
/// Tolerates noise around the JSON array, which `cv` prints when the host
/// emits deprecation warnings during bootstrap. The array starts on the
/// first line beginning with `[` that parses; lines such as
/// `[warning] ...` are skipped.
pub(crate) fn parse_list(stdout: &str) -> std::result::Result<Vec<HostExtension>, String> {
    let mut last_error = None;
    let mut offset = 0;
    for line in stdout.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let start = offset + indent;
        offset += line.len();
        if !line.trim_start().starts_with('[') {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&stdout[start..]).into_iter::<Vec<CvRow>>();
        match stream.next() {
            Some(Ok(rows)) => {
                return Ok(rows
                    .into_iter()
                    .map(|row| HostExtension {
                        status: HostStatus::from_cv(&row.status),
                        name: row.key,
                    })
                    .collect());
            }
            Some(Err(e)) => last_error = Some(e.to_string()),
            None => {}
        }
    }
    Err(last_error.unwrap_or_else(|| format!("expected a JSON array, got: {}", stdout.trim())))
}

impl HostApplication for CvHost {
    fn list(&self, scope: ListScope) -> Result<Vec<HostExtension>> {
        let args: &[&str] = match scope {
            ListScope::Local => &["ext:list", "--local", "--out=json"],
            ListScope::All => &["ext:list", "--out=json"],
        };
        let output = self.cv("list", "*", args)?;
        parse_list(&output.stdout).map_err(|message| Error::HostOperation {
            operation: "list",
            target: "*".to_string(),
            message,
        })
    }

    fn refresh(&self) -> Result<()> {
        if self.flush_on_refresh {
            self.cv("flush", "*", &["flush"])?;
        }
        self.cv("refresh", "*", &["ext:list", "--refresh"])?;
        tracing::info!("host extension registry refreshed");
        Ok(())
    }

    fn enable(&self, name: &str) -> Result<()> {
        self.cv("enable", name, &["ext:enable", name])?;
        Ok(())
    }

    fn disable(&self, name: &str) -> Result<()> {
        self.cv("disable", name, &["ext:disable", name])?;
        Ok(())
    }

    fn uninstall(&self, name: &str) -> Result<()> {
        self.cv("uninstall", name, &["ext:uninstall", name])?;
        Ok(())
    }
}
