//! Orchestration interfaces.

use std::time::Duration;

use serde::{Serialize, Serializer};

use pireduce_core::constants::{ESTIMATE_SCALE, REFERENCE_CONSTANT};
use pireduce_core::SegmentFailure;

use crate::statistics::RunStatistics;

/// Trait for presenting results to the user.
pub trait ResultPresenter: Send + Sync {
    /// Present the outcome of one run.
    fn present_report(&self, report: &RunReport);

    /// Present statistics over several runs.
    fn present_statistics(&self, stats: &RunStatistics);

    /// Present an error.
    fn present_error(&self, error: &str);
}

/// Outcome of one run of one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Backend name.
    pub backend: String,
    /// Total number of series terms.
    pub total: u64,
    /// Terms per segment.
    pub segment_size: u64,
    /// Number of segments dispatched.
    pub segments: usize,
    /// Sum of all partial results.
    pub aggregate: f64,
    /// `aggregate * 4`.
    pub estimate: f64,
    /// Absolute distance between the estimate and pi.
    pub error: f64,
    /// Wall-clock time of the reduction.
    #[serde(rename = "elapsed_secs", serialize_with = "duration_secs")]
    pub elapsed: Duration,
    /// Segments that contributed nothing.
    pub failures: Vec<SegmentFailure>,
}

impl RunReport {
    /// Whether every segment contributed to the aggregate.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Estimate of pi derived from a Leibniz aggregate.
#[must_use]
pub fn estimate_from(aggregate: f64) -> f64 {
    aggregate * ESTIMATE_SCALE
}

/// Absolute error of an estimate.
#[must_use]
pub fn error_of(estimate: f64) -> f64 {
    (REFERENCE_CONSTANT - estimate).abs()
}

fn duration_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
