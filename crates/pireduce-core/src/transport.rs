//! The `RemoteEval` capability and the command-based transport.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::constants::LOCAL_ENDPOINT;
use crate::segment::Segment;
use crate::subprocess::{parse_partial, run_to_completion, SubprocessError, WorkerCommand};

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<SubprocessError> for RemoteError {
    fn from(err: SubprocessError) -> Self {
        match err {
            SubprocessError::Timeout(limit) => RemoteError::Timeout(limit),
            other => RemoteError::Transport(other.to_string()),
        }
    }
}

/// Evaluate one segment on a network-reachable worker.
///
/// Implementations return exactly one scalar per call and should give up
/// once `timeout` has elapsed.
pub trait RemoteEval: Send + Sync + fmt::Debug {
    fn eval(&self, endpoint: &str, segment: Segment, timeout: Duration) -> Result<f64, RemoteError>;
}

/// Transport that launches the single-segment worker over ssh, or directly
/// for the `local` endpoint, and parses the float it prints.
#[derive(Debug, Clone)]
pub struct CommandTransport {
    ssh_program: PathBuf,
    remote_worker: WorkerCommand,
    local_worker: WorkerCommand,
}

impl CommandTransport {
    /// Transport running `remote_worker` on ssh hosts and `local_worker`
    /// for the `local` endpoint.
    #[must_use]
    pub fn new(remote_worker: WorkerCommand, local_worker: WorkerCommand) -> Self {
        Self {
            ssh_program: PathBuf::from("ssh"),
            remote_worker,
            local_worker,
        }
    }

    /// Use a different ssh client binary.
    #[must_use]
    pub fn with_ssh_program(mut self, ssh_program: impl Into<PathBuf>) -> Self {
        self.ssh_program = ssh_program.into();
        self
    }

    /// The command that would evaluate `segment` on `endpoint`.
    #[must_use]
    pub fn command_for(&self, endpoint: &str, segment: Segment) -> Command {
        if endpoint == LOCAL_ENDPOINT {
            return self.local_worker.single_segment(segment);
        }

        let mut command = Command::new(&self.ssh_program);
        command
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "BatchMode=yes"])
            .arg(endpoint)
            .arg(self.remote_worker.program())
            .args(self.remote_worker.single_segment_args(segment));
        command
    }
}

impl RemoteEval for CommandTransport {
    fn eval(
        &self,
        endpoint: &str,
        segment: Segment,
        timeout: Duration,
    ) -> Result<f64, RemoteError> {
        debug!(endpoint, %segment, "launching remote worker");
        let stdout = run_to_completion(self.command_for(endpoint, segment), Some(timeout))?;
        Ok(parse_partial(&stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn ssh_command_shape() {
        let transport = CommandTransport::new(
            WorkerCommand::new("/opt/pireduce"),
            WorkerCommand::new("/usr/bin/pireduce"),
        );
        let command = transport.command_for("node-1", Segment::new(0, 10));
        assert_eq!(command.get_program(), "ssh");
        assert_eq!(
            args(&command),
            [
                "-o", "StrictHostKeyChecking=no",
                "-o", "UserKnownHostsFile=/dev/null",
                "-o", "BatchMode=yes",
                "node-1", "/opt/pireduce",
                "--internal", "--start", "0", "--count", "10",
            ]
        );
    }

    #[test]
    fn local_endpoint_skips_ssh() {
        let transport = CommandTransport::new(
            WorkerCommand::new("/opt/pireduce"),
            WorkerCommand::new("/usr/bin/pireduce"),
        );
        let command = transport.command_for(LOCAL_ENDPOINT, Segment::new(5, 5));
        assert_eq!(command.get_program(), "/usr/bin/pireduce");
        assert_eq!(args(&command), ["--internal", "--start", "5", "--count", "5"]);
    }

    #[test]
    fn subprocess_errors_map_to_remote_errors() {
        let limit = Duration::from_secs(2);
        assert_eq!(
            RemoteError::from(SubprocessError::Timeout(limit)),
            RemoteError::Timeout(limit)
        );
        assert!(matches!(
            RemoteError::from(SubprocessError::Malformed("x".into())),
            RemoteError::Transport(_)
        ));
    }

    #[test]
    fn missing_ssh_client_is_a_transport_error() {
        let transport = CommandTransport::new(
            WorkerCommand::new("pireduce"),
            WorkerCommand::new("pireduce"),
        )
        .with_ssh_program("/definitely/not/ssh");
        let err = transport
            .eval("node-1", Segment::new(0, 1), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }

    #[cfg(unix)]
    #[test]
    fn local_endpoint_parses_worker_output() {
        let worker = WorkerCommand::new("sh").arg("-c").arg("echo 0.125").arg("worker");
        let transport = CommandTransport::new(worker.clone(), worker);
        let value = transport
            .eval(LOCAL_ENDPOINT, Segment::new(0, 1), Duration::from_secs(10))
            .unwrap();
        assert_eq!(value, 0.125);
    }
}
