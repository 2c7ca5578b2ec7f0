//! Fixed-size rayon pool draining one job per segment.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::ThreadPoolBuilder;
use tracing::debug;

use crate::aggregate::Reduction;
use crate::backend::{Backend, ReductionError};
use crate::backends::panic_message;
use crate::kernel::{EvaluatorError, SegmentKernel};
use crate::segment::Segment;

/// Bounded worker pool. Jobs queue inside the pool, so any number of
/// segments is accepted regardless of `workers`.
#[derive(Debug, Clone, Copy)]
pub struct ThreadPoolBackend {
    workers: usize,
}

impl ThreadPoolBackend {
    /// Pool backend with `workers` threads.
    pub fn new(workers: usize) -> Result<Self, ReductionError> {
        if workers == 0 {
            return Err(ReductionError::InvalidConfiguration(
                "thread pool needs at least one worker".into(),
            ));
        }
        Ok(Self { workers })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Backend for ThreadPoolBackend {
    fn reduce(
        &self,
        segments: &[Segment],
        kernel: &dyn SegmentKernel,
    ) -> Result<Reduction, ReductionError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("pool-worker-{i}"))
            .build()
            .map_err(|e| ReductionError::Spawn(e.to_string()))?;

        let mut slots: Vec<Option<Result<f64, EvaluatorError>>> =
            (0..segments.len()).map(|_| None).collect();
        let aborted = AtomicBool::new(false);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.scope(|scope| {
                for (slot, &segment) in slots.iter_mut().zip(segments) {
                    let aborted = &aborted;
                    scope.spawn(move |_| {
                        if aborted.load(Ordering::Relaxed) {
                            return;
                        }
                        let result = kernel.evaluate(segment);
                        if result.is_err() {
                            aborted.store(true, Ordering::Relaxed);
                        }
                        *slot = Some(result);
                    });
                }
            });
        }));
        if let Err(payload) = outcome {
            return Err(ReductionError::Panicked(panic_message(payload.as_ref())));
        }

        // The first failure by index wins; skipped slots only exist after one.
        let mut partials = Vec::with_capacity(slots.len());
        let mut first_error = None;
        for slot in slots {
            match slot {
                Some(Ok(value)) => partials.push(value),
                Some(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                None => {}
            }
        }
        if let Some(err) = first_error {
            return Err(err.into());
        }

        debug!(workers = self.workers, segments = partials.len(), "thread pool drained");
        Ok(Reduction::from_partials(&partials))
    }

    fn name(&self) -> &str {
        "thread-pool"
    }
}
