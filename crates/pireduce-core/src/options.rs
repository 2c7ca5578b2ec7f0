//! Backend configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendKind, ReductionError};
use crate::subprocess::WorkerCommand;
use crate::transport::RemoteEval;

/// Exactly one backend and its parameters.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// One thread per segment.
    Concurrent,
    /// Fixed-size thread pool.
    ThreadPool {
        /// Number of pool threads.
        workers: usize,
    },
    /// One process per segment.
    Processes {
        /// Command that evaluates a single segment.
        worker: WorkerCommand,
    },
    /// Pool of long-lived worker processes.
    ProcessPool {
        /// Maximum number of live worker processes.
        size: usize,
        /// Command that starts a pool worker.
        worker: WorkerCommand,
    },
    /// Round-robin dispatch over a remote transport.
    Remote {
        endpoints: Vec<String>,
        timeout: Duration,
        transport: Arc<dyn RemoteEval>,
    },
    /// Producer/consumer pipeline over a bounded queue.
    Pipeline {
        /// Number of consumer threads.
        consumers: usize,
        /// Queue capacity in messages.
        capacity: usize,
    },
}

impl BackendConfig {
    /// The backend kind this configuration selects.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Concurrent => BackendKind::Concurrent,
            BackendConfig::ThreadPool { .. } => BackendKind::ThreadPool,
            BackendConfig::Processes { .. } => BackendKind::Processes,
            BackendConfig::ProcessPool { .. } => BackendKind::ProcessPool,
            BackendConfig::Remote { .. } => BackendKind::Remote,
            BackendConfig::Pipeline { .. } => BackendKind::Pipeline,
        }
    }

    /// Check parameters before any work is dispatched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for zero pool or consumer counts, an
    /// empty endpoint list, a zero timeout, or a zero queue capacity.
    pub fn validate(&self) -> Result<(), ReductionError> {
        let problem = match self {
            BackendConfig::ThreadPool { workers: 0 } => Some("thread pool size must be positive"),
            BackendConfig::ProcessPool { size: 0, .. } => {
                Some("process pool size must be positive")
            }
            BackendConfig::Remote { endpoints, .. } if endpoints.is_empty() => {
                Some("remote dispatch needs at least one endpoint")
            }
            BackendConfig::Remote { timeout, .. } if timeout.is_zero() => {
                Some("remote timeout must be positive")
            }
            BackendConfig::Pipeline { consumers: 0, .. } => {
                Some("pipeline needs at least one consumer")
            }
            BackendConfig::Pipeline { capacity: 0, .. } => {
                Some("pipeline queue capacity must be positive")
            }
            _ => None,
        };
        match problem {
            Some(msg) => Err(ReductionError::InvalidConfiguration(msg.into())),
            None => Ok(()),
        }
    }
}
