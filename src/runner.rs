//! External collaborator execution
//!
//! Every external command the pipeline runs (toolchain installer, binary
//! fetchers, lifecycle hooks, the package manager) goes through a
//! [`StepRunner`]. The environment is passed explicitly with each step;
//! the pipeline never mutates the process environment.

use crate::diagnostics::DiagnosticLog;
use crate::error::{KilnError, KilnResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Environment handed to a collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepEnv {
    /// Variables set for the child process
    pub vars: BTreeMap<String, String>,
    /// Directories prepended to PATH, first entry wins
    pub path_prepend: Vec<PathBuf>,
}

impl StepEnv {
    /// Create from a variable map
    pub fn new(vars: BTreeMap<String, String>) -> Self {
        Self {
            vars,
            path_prepend: Vec::new(),
        }
    }

    /// Prepend a directory to PATH, keeping earlier prepends in front
    pub fn with_path(mut self, dir: PathBuf) -> Self {
        if !self.path_prepend.contains(&dir) {
            self.path_prepend.push(dir);
        }
        self
    }

    /// PATH value for the child given the inherited PATH
    pub fn path_value(&self, inherited: Option<OsString>) -> KilnResult<OsString> {
        let mut dirs: Vec<PathBuf> = self.path_prepend.clone();
        if let Some(inherited) = inherited {
            dirs.extend(std::env::split_paths(&inherited));
        }
        std::env::join_paths(dirs)
            .map_err(|e| KilnError::Internal(format!("building PATH: {}", e)))
    }
}

/// One collaborator invocation
#[derive(Debug, Clone)]
pub struct Step {
    /// Human-readable name used in logs and errors
    pub label: String,
    /// Shell command line
    pub command: String,
    /// Working directory
    pub cwd: PathBuf,
    /// Environment overlay
    pub env: StepEnv,
}

impl Step {
    /// Create a step
    pub fn new(label: impl Into<String>, command: impl Into<String>, cwd: &Path, env: StepEnv) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            cwd: cwd.to_path_buf(),
            env,
        }
    }
}

/// Result of running a step
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Process exit code
    pub code: i32,
    /// Combined stdout and stderr lines, in arrival order
    pub output: Vec<String>,
    /// Stdout lines only
    pub stdout: Vec<String>,
}

impl StepOutcome {
    /// Whether the step exited zero
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero exit into a `StepFailed` error
    pub fn ensure_success(self, step: &Step) -> KilnResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(KilnError::StepFailed {
                step: step.label.clone(),
                code: self.code,
            })
        }
    }
}

/// Runs external collaborators
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run a step to completion, appending its output to `log`
    async fn run(&self, step: &Step, log: &DiagnosticLog) -> KilnResult<StepOutcome>;

    /// Human-readable runner name
    fn runner_name(&self) -> &'static str;
}

/// Runs steps through `sh -c`
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    /// Create a shell runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepRunner for ShellRunner {
    async fn run(&self, step: &Step, log: &DiagnosticLog) -> KilnResult<StepOutcome> {
        debug!("Executing {}: sh -c {:?}", step.label, step.command);

        let path = step.env.path_value(std::env::var_os("PATH"))?;
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&step.command)
            .current_dir(&step.cwd)
            .envs(&step.env.vars)
            .env("PATH", path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KilnError::command_failed(&step.command, e))?;

        let streamed = stream_child_output(&mut child, log).await;
        let (output, stdout) = match streamed {
            Ok(lines) => lines,
            Err(e) => {
                if let Err(kill) = child.kill().await {
                    warn!("Failed to stop {}: {}", step.label, kill);
                }
                return Err(e);
            }
        };

        let status = child
            .wait()
            .await
            .map_err(|e| KilnError::command_failed(&step.command, e))?;
        let code = status.code().ok_or(KilnError::ProcessSignaled)?;

        debug!("{} exited with {}", step.label, code);
        Ok(StepOutcome { code, output, stdout })
    }

    fn runner_name(&self) -> &'static str {
        "sh"
    }
}

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Stream stdout+stderr from a child process into the log as lines arrive.
///
/// Lines are decoded lossily so stray non-UTF-8 bytes never stop the
/// drain. Returns all collected lines and the stdout lines on their own.
async fn stream_child_output(
    child: &mut tokio::process::Child,
    log: &DiagnosticLog,
) -> KilnResult<(Vec<String>, Vec<String>)> {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(KilnError::Internal("child output not piped".to_string()));
    };
    stream_lines(stdout, stderr, log).await
}

async fn stream_lines<O, E>(stdout: O, stderr: E, log: &DiagnosticLog) -> KilnResult<(Vec<String>, Vec<String>)>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    // Partial reads survive a lost select race in these buffers
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let mut all_output = Vec::new();
    let mut stdout_lines = Vec::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stdout_done || !stderr_done {
        let (pipe, read) = tokio::select! {
            read = stdout_reader.read_until(b'\n', &mut stdout_buf), if !stdout_done => (Pipe::Stdout, read),
            read = stderr_reader.read_until(b'\n', &mut stderr_buf), if !stderr_done => (Pipe::Stderr, read),
        };

        let (buf, done) = match pipe {
            Pipe::Stdout => (&mut stdout_buf, &mut stdout_done),
            Pipe::Stderr => (&mut stderr_buf, &mut stderr_done),
        };

        match read {
            Ok(0) => *done = true,
            Ok(_) if !buf.ends_with(b"\n") => {
                // Final line without a newline; the next read reports EOF
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed reading child {:?}: {}", pipe, e);
                if let Err(note) = log.line(&format!("kiln: output stream error: {}", e)).await {
                    warn!("Failed to record stream error: {}", note);
                }
                return Err(KilnError::io(format!("reading child {:?}", pipe), e));
            }
        }

        if buf.is_empty() {
            continue;
        }
        let line = decode_line(buf);
        buf.clear();

        log.line(&line).await?;
        if pipe == Pipe::Stdout {
            stdout_lines.push(line.clone());
        }
        all_output.push(line);
    }

    Ok((all_output, stdout_lines))
}

/// Decode one raw line, dropping the line terminator
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if raw[..end].ends_with(b"\n") {
        end -= 1;
    }
    if raw[..end].ends_with(b"\r") {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
