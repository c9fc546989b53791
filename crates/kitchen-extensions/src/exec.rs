//! Blocking process execution with a hard timeout.
//!
//! Host commands and seed scripts are blocking calls from the pipeline's
//! point of view, but each one must give up after a deadline. Commands run
//! on a single-threaded tokio runtime under [`tokio::time::timeout`]; the
//! child is killed when the deadline passes.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

/// Output captured from a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable failure description that keeps the process's own text.
    pub fn failure_text(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let detail = if !self.stderr.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        };
        if detail.is_empty() {
            status
        } else {
            format!("{status}: {detail}")
        }
    }
}

/// Why a process could not be run to completion.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("I/O error while waiting for process: {0}")]
    Io(#[from] std::io::Error),
}

/// Build a command that runs `program` with `args`, optionally behind a
/// prefix such as `["docker", "exec", "civicrm"]`.
pub fn command<S: AsRef<OsStr>>(prefix: &[String], program: &str, args: &[S]) -> std::process::Command {
    let mut cmd = match prefix.split_first() {
        Some((first, rest)) => {
            let mut c = std::process::Command::new(first);
            c.args(rest).arg(program);
            c
        }
        None => std::process::Command::new(program),
    };
    cmd.args(args);
    cmd
}

/// Build a command that executes `script` with `interpreter` in `working_dir`.
pub fn script_command(interpreter: &str, script: &Path, working_dir: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(interpreter);
    cmd.arg(script).current_dir(working_dir);
    cmd
}

/// Run `command` to completion, capturing its output, or kill it once
/// `timeout` elapses.
pub fn run(command: std::process::Command, timeout: Duration) -> Result<CapturedOutput, ExecError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut cmd = tokio::process::Command::from(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout(timeout))??;

        let captured = CapturedOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        for line in captured.stdout.lines() {
            tracing::debug!(target: "civikitchen::exec", program = %program, "{line}");
        }
        Ok::<_, ExecError>(captured)
    })
}
