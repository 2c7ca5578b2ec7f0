//! # pireduce-core
//!
//! Core library for the pireduce partitioned-reduction executor.
//! Splits a numeric series into segments, evaluates them on one of six
//! interchangeable backends, and sums the partial results.

pub mod aggregate;
pub mod backend;
pub mod backends;
pub mod constants;
pub mod kernel;
pub mod options;
pub mod protocol;
pub mod registry;
pub mod segment;
pub mod subprocess;
pub mod transport;

// Re-exports
pub use aggregate::{reduce, Reduction, SegmentFailure, SharedAccumulator};
pub use backend::{Backend, BackendKind, DispatchPhase, PhaseTracker, ReductionError};
pub use constants::{exit_codes, DEFAULT_ITERATIONS, DEFAULT_SEGMENT_SIZE, ESTIMATE_SCALE};
pub use kernel::{EvaluatorError, FnKernel, LeibnizKernel, SegmentKernel};
pub use options::BackendConfig;
pub use registry::{BackendFactory, DefaultFactory};
pub use segment::{segment_all, Segment};
pub use subprocess::WorkerCommand;
pub use transport::{CommandTransport, RemoteError, RemoteEval};

/// Sum the Leibniz series over `[0, total)` with the concurrent backend.
///
/// This is a convenience function for simple use cases. For backend
/// selection and failure diagnostics, use the `Backend` trait directly.
///
/// # Errors
///
/// Returns `InvalidConfiguration` when `segment_size` is zero.
///
/// # Example
/// ```
/// let sum = pireduce_core::leibniz_sum(1000, 100).unwrap();
/// assert!((4.0 * sum - std::f64::consts::PI).abs() < 0.01);
/// assert_eq!(pireduce_core::leibniz_sum(0, 10).unwrap(), 0.0);
/// ```
pub fn leibniz_sum(total: u64, segment_size: u64) -> Result<f64, ReductionError> {
    let segments = segment_all(total, segment_size)?;
    let reduction = backends::ConcurrentBackend::new().reduce(&segments, &LeibnizKernel::new())?;
    Ok(reduction.aggregate)
}
