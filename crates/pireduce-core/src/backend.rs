//! The `Backend` trait, its error type, and the dispatch state machine.
//!
//! `Backend` is the public trait consumed by orchestration. Every
//! implementation evaluates a full segment sequence and returns the
//! `Reduction`; they differ only in concurrency model and failure policy.

use std::fmt;

use tracing::debug;

use crate::aggregate::Reduction;
use crate::kernel::{EvaluatorError, SegmentKernel};
use crate::segment::Segment;

/// Error type for a reduction run.
#[derive(Debug, thiserror::Error)]
pub enum ReductionError {
    /// Malformed or missing parameters; raised before any dispatch.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The injected kernel failed for some segment.
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// A worker process crashed, exited non-zero, or replied garbage.
    #[error("worker for segment {index} failed: {reason}")]
    WorkerFailure { index: usize, reason: String },

    /// A thread, pool, or process could not be started.
    #[error("failed to launch worker: {0}")]
    Spawn(String),

    /// A worker thread panicked.
    #[error("worker thread panicked: {0}")]
    Panicked(String),
}

impl From<std::io::Error> for ReductionError {
    fn from(err: std::io::Error) -> Self {
        Self::Spawn(err.to_string())
    }
}

/// An execution strategy that evaluates every segment and sums the partials.
pub trait Backend: Send + Sync {
    /// Evaluate all `segments` with `kernel` and combine the partials.
    fn reduce(
        &self,
        segments: &[Segment],
        kernel: &dyn SegmentKernel,
    ) -> Result<Reduction, ReductionError>;

    /// Name of this backend.
    fn name(&self) -> &str;
}

/// The six backend kinds, one per execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Concurrent,
    ThreadPool,
    Processes,
    ProcessPool,
    Remote,
    Pipeline,
}

impl BackendKind {
    /// Every kind, in presentation order.
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Concurrent,
        BackendKind::ThreadPool,
        BackendKind::Processes,
        BackendKind::ProcessPool,
        BackendKind::Remote,
        BackendKind::Pipeline,
    ];

    /// Short stable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Concurrent => "concurrent",
            BackendKind::ThreadPool => "thread-pool",
            BackendKind::Processes => "processes",
            BackendKind::ProcessPool => "process-pool",
            BackendKind::Remote => "remote",
            BackendKind::Pipeline => "pipeline",
        }
    }

    /// Kinds that evaluate segments in child processes running the
    /// worker binary's kernel instead of the injected one.
    #[must_use]
    pub const fn is_out_of_process(self) -> bool {
        matches!(self, BackendKind::Processes | BackendKind::ProcessPool)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Phases shared by the process-based and pool-based backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DispatchPhase {
    Idle,
    Dispatching,
    Awaiting,
    Aggregating,
    Done,
}

/// Forward-only tracker for `DispatchPhase` transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    backend: &'static str,
    phase: DispatchPhase,
}

impl PhaseTracker {
    #[must_use]
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            phase: DispatchPhase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    /// Move to `next`, which must come after the current phase.
    pub fn advance(&mut self, next: DispatchPhase) {
        debug_assert!(
            next > self.phase,
            "{}: illegal transition {:?} -> {next:?}",
            self.backend,
            self.phase
        );
        debug!(backend = self.backend, from = ?self.phase, to = ?next, "dispatch phase");
        self.phase = next;
    }
}
