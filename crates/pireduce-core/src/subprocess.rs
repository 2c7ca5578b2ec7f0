//! Launching worker processes and collecting their single-value output.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;

use crate::constants::{INTERNAL_FLAG, WORKER_FLAG};
use crate::segment::Segment;

/// How often a worker that closed its output is polled for exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Failure while running a worker process.
#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker exited with {0}")]
    Exit(ExitStatus),

    #[error("worker timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed worker output: {0:?}")]
    Malformed(String),

    #[error("worker i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Program plus leading arguments used to start a worker.
///
/// The single-segment invocation appends
/// `--internal --start S --count C`; the pool invocation appends `--worker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    /// Worker command running `program` with no leading arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Worker command re-executing the running binary.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Append a leading argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Leading arguments followed by the single-segment flags.
    #[must_use]
    pub fn single_segment_args(&self, segment: Segment) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            INTERNAL_FLAG.to_string(),
            "--start".to_string(),
            segment.start.to_string(),
            "--count".to_string(),
            segment.count.to_string(),
        ]);
        args
    }

    /// Command evaluating exactly one segment.
    #[must_use]
    pub fn single_segment(&self, segment: Segment) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.single_segment_args(segment));
        command
    }

    /// Command starting a long-lived pool worker.
    #[must_use]
    pub fn pool_worker(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(WORKER_FLAG);
        command
    }
}

/// Parse the single floating-point value a worker printed.
///
/// # Example
/// ```
/// use pireduce_core::subprocess::parse_partial;
///
/// assert_eq!(parse_partial("0.7604599047323508\n").unwrap(), 0.7604599047323508);
/// assert!(parse_partial("not a number").is_err());
/// ```
pub fn parse_partial(stdout: &str) -> Result<f64, SubprocessError> {
    let trimmed = stdout.trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| SubprocessError::Malformed(trimmed.to_string()))
}

/// Spawn `command` with stdout captured and stderr inherited.
pub fn spawn_captured(mut command: Command) -> Result<Child, SubprocessError> {
    let program = command.get_program().to_string_lossy().into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| SubprocessError::Spawn { program, source })
}

/// Wait for an already spawned child and return its stdout.
pub fn finish(child: Child) -> Result<String, SubprocessError> {
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(SubprocessError::Exit(output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run `command` to completion and return its stdout, killing it once
/// `timeout` elapses.
pub fn run_to_completion(
    command: Command,
    timeout: Option<Duration>,
) -> Result<String, SubprocessError> {
    let Some(limit) = timeout else {
        return finish(spawn_captured(command)?);
    };

    let mut child = spawn_captured(command)?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("worker stdout was not captured"))?;

    let deadline = Instant::now() + limit;
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let mut out = String::new();
        let read = stdout.read_to_string(&mut out).map(|_| out);
        let _ = tx.send(read);
    });

    match rx.recv_deadline(deadline) {
        Ok(read) => {
            let Some(status) = wait_until(&mut child, deadline)? else {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SubprocessError::Timeout(limit));
            };
            let out = read?;
            if !status.success() {
                return Err(SubprocessError::Exit(status));
            }
            Ok(out)
        }
        Err(RecvTimeoutError::Timeout) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(SubprocessError::Timeout(limit))
        }
        Err(RecvTimeoutError::Disconnected) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(SubprocessError::Io(std::io::Error::other(
                "worker output reader exited",
            )))
        }
    }
}

/// Poll `child` until it exits or `deadline` passes; `None` on expiry.
fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
    }
}
