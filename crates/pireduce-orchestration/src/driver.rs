//! Run driver: segment, dispatch, time, and report.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use pireduce_core::{
    segment_all, BackendConfig, BackendFactory, DefaultFactory, LeibnizKernel, ReductionError,
    SegmentKernel,
};

use crate::interfaces::{error_of, estimate_from, RunReport};
use crate::statistics::RunStatistics;

/// Drives a backend over a freshly segmented series.
pub struct Driver {
    kernel: Arc<dyn SegmentKernel>,
    factory: Box<dyn BackendFactory>,
}

impl Driver {
    /// Driver evaluating segments with `kernel` on the built-in backends.
    #[must_use]
    pub fn new(kernel: Arc<dyn SegmentKernel>) -> Self {
        Self {
            kernel,
            factory: Box::new(DefaultFactory::new()),
        }
    }

    /// Replace the backend factory.
    #[must_use]
    pub fn with_factory(mut self, factory: Box<dyn BackendFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Sum `total` terms split into segments of `segment_size` on the
    /// backend described by `config`.
    ///
    /// # Errors
    ///
    /// Configuration errors, including an injected kernel paired with a
    /// process backend, are raised before any segment is dispatched;
    /// fail-fast backends propagate their first failure.
    pub fn run(
        &self,
        total: u64,
        segment_size: u64,
        config: &BackendConfig,
    ) -> Result<RunReport, ReductionError> {
        config.validate()?;
        if config.kind().is_out_of_process() && !self.kernel.is_worker_builtin() {
            return Err(ReductionError::InvalidConfiguration(format!(
                "kernel {} cannot run on the {} backend; its workers use the built-in kernel",
                self.kernel.name(),
                config.kind()
            )));
        }
        let segments = segment_all(total, segment_size)?;
        let backend = self.factory.create(config)?;

        let start = Instant::now();
        let reduction = backend.reduce(&segments, self.kernel.as_ref())?;
        let elapsed = start.elapsed();

        let estimate = estimate_from(reduction.aggregate);
        let report = RunReport {
            backend: backend.name().to_string(),
            total,
            segment_size,
            segments: segments.len(),
            aggregate: reduction.aggregate,
            estimate,
            error: error_of(estimate),
            elapsed,
            failures: reduction.failures,
        };

        if !report.is_complete() {
            warn!(
                backend = %report.backend,
                failed = report.failures.len(),
                segments = report.segments,
                "aggregate is missing failed segments"
            );
        }
        info!(
            backend = %report.backend,
            kernel = self.kernel.name(),
            segments = report.segments,
            estimate = report.estimate,
            error = report.error,
            elapsed_secs = elapsed.as_secs_f64(),
            "run complete"
        );
        Ok(report)
    }

    /// Run the same configuration `runs` times and summarise the results.
    ///
    /// # Errors
    ///
    /// `runs == 0` is `InvalidConfiguration`; the first failing run aborts.
    pub fn run_repeated(
        &self,
        runs: usize,
        total: u64,
        segment_size: u64,
        config: &BackendConfig,
    ) -> Result<RunStatistics, ReductionError> {
        if runs == 0 {
            return Err(ReductionError::InvalidConfiguration(
                "run count must be positive".into(),
            ));
        }
        let reports = (0..runs)
            .map(|_| self.run(total, segment_size, config))
            .collect::<Result<Vec<_>, _>>()?;
        RunStatistics::from_reports(reports).ok_or_else(|| {
            ReductionError::InvalidConfiguration("no runs were recorded".into())
        })
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(Arc::new(LeibnizKernel::new()))
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("kernel", &self.kernel.name())
            .field("backends", &self.factory.available())
            .finish()
    }
}
