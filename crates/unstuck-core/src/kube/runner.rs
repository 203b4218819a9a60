//! Subprocess runner for kubectl.
//!
//! Every cluster call goes through [`CommandRunner::run`], which enforces:
//!
//! - A per-call timeout; the child is killed once it expires
//! - An output cap per stream so a huge list cannot exhaust memory
//! - Optional stdin payload (used by the namespace finalize call)
//! - Command validation so the binary name can't smuggle shell syntax

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

/// Per-call limit when a `CommandSpec` sets none.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bytes kept per stream; the rest is drained and dropped.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("invalid command path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output from one command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    pub args: Vec<String>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// None when the process was killed.
    pub exit_code: Option<i32>,
    /// Either stream hit the output cap.
    pub truncated: bool,
    pub duration: Duration,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
    /// Falls back to the runner's default.
    pub timeout: Option<Duration>,
    pub max_output: Option<usize>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            stdin: None,
            timeout: None,
            max_output: None,
        }
    }

    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = Some(max_output);
        self
    }
}

/// Runs commands with a timeout and output cap.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    default_timeout: Duration,
    max_output_bytes: usize,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl CommandRunner {
    pub fn new(default_timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            default_timeout,
            max_output_bytes,
        }
    }

    /// Run a command from a specification.
    ///
    /// A timeout is not an error: the child is killed and the output comes
    /// back with `timed_out` set.
    #[instrument(skip(self, spec), fields(cmd = %spec.command, verb = spec.args.first().map(String::as_str).unwrap_or("")))]
    pub fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        validate_command(&spec.command)?;

        let timeout = spec.timeout.unwrap_or(self.default_timeout);
        let max_output = spec.max_output.unwrap_or(self.max_output_bytes);

        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::CommandNotFound(spec.command.clone())
            } else {
                RunnerError::SpawnFailed(format!("{}: {}", spec.command, e))
            }
        })?;
        trace!(pid = child.id(), "spawned");

        if let (Some(input), Some(mut stdin)) = (spec.stdin.as_ref(), child.stdin.take()) {
            // A child that exits early closes the pipe; its exit status reports that.
            if let Err(e) = stdin.write_all(input) {
                debug!(error = %e, "stdin write failed");
            }
        }

        let stdout = child.stdout.take().map(|s| spawn_reader(s, max_output));
        let stderr = child.stderr.take().map(|s| spawn_reader(s, max_output));

        let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;

        let (stdout, stdout_truncated) = join_reader(stdout);
        let (stderr, stderr_truncated) = join_reader(stderr);
        let duration = start.elapsed();

        if timed_out {
            warn!(timeout_ms = timeout.as_millis() as u64, "command timed out");
        } else {
            debug!(
                exit_code = exit_code.unwrap_or(-1),
                duration_ms = duration.as_millis() as u64,
                stdout_bytes = stdout.len(),
                "command finished"
            );
        }

        Ok(CommandOutput {
            command: spec.command.clone(),
            args: spec.args.clone(),
            stdout,
            stderr,
            exit_code,
            truncated: stdout_truncated || stderr_truncated,
            duration,
            timed_out,
        })
    }
}

fn validate_command(cmd: &str) -> Result<(), RunnerError> {
    if cmd.trim().is_empty() {
        return Err(RunnerError::InvalidPath("empty command".to_string()));
    }

    if cmd.contains(['|', '&', ';', '$', '`', '\n', '\r']) {
        return Err(RunnerError::InvalidPath(format!(
            "command contains shell metacharacters: {}",
            cmd
        )));
    }

    if cmd.starts_with('/') && !Path::new(cmd).exists() {
        return Err(RunnerError::CommandNotFound(cmd.to_string()));
    }

    Ok(())
}

/// Poll the child until it exits or `timeout` elapses; kill it on timeout.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<(Option<i32>, bool), RunnerError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                debug!(error = %e, "kill failed (process may have exited)");
            }
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Drain a pipe on its own thread, keeping at most `limit` bytes.
///
/// The pipe is read to EOF even past the limit so the child never blocks on a full pipe.
fn spawn_reader<R: Read + Send + 'static>(
    mut stream: R,
    limit: usize,
) -> JoinHandle<(Vec<u8>, bool)> {
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&buf[..n.min(room)]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        (kept, truncated)
    })
}

fn join_reader(handle: Option<JoinHandle<(Vec<u8>, bool)>>) -> (Vec<u8>, bool) {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_else(|| (Vec::new(), false))
}
