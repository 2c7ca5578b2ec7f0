//! One OS thread per segment, writing into pre-sized result slots.

use tracing::debug;

use crate::aggregate::Reduction;
use crate::backend::{Backend, ReductionError};
use crate::backends::panic_message;
use crate::kernel::{EvaluatorError, SegmentKernel};
use crate::segment::Segment;

/// Spawns one scoped thread per segment. Each thread owns exactly one slot,
/// so the slots need no lock; they are read only after every thread joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrentBackend;

impl ConcurrentBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Backend for ConcurrentBackend {
    fn reduce(
        &self,
        segments: &[Segment],
        kernel: &dyn SegmentKernel,
    ) -> Result<Reduction, ReductionError> {
        let mut slots: Vec<Option<Result<f64, EvaluatorError>>> =
            (0..segments.len()).map(|_| None).collect();

        std::thread::scope(|scope| -> Result<(), ReductionError> {
            let mut handles = Vec::with_capacity(segments.len());
            let mut spawn_error = None;
            for (index, (slot, &segment)) in slots.iter_mut().zip(segments).enumerate() {
                let spawned = std::thread::Builder::new()
                    .name(format!("segment-{index}"))
                    .spawn_scoped(scope, move || *slot = Some(kernel.evaluate(segment)));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        spawn_error = Some(ReductionError::from(err));
                        break;
                    }
                }
            }

            let mut panicked = None;
            for handle in handles {
                if let Err(payload) = handle.join() {
                    panicked.get_or_insert_with(|| panic_message(payload.as_ref()));
                }
            }

            if let Some(err) = spawn_error {
                return Err(err);
            }
            panicked.map_or(Ok(()), |msg| Err(ReductionError::Panicked(msg)))
        })?;

        let partials = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Some(result) => result.map_err(ReductionError::from),
                None => Err(ReductionError::Panicked(format!(
                    "segment {index} left unevaluated"
                ))),
            })
            .collect::<Result<Vec<f64>, _>>()?;

        debug!(segments = partials.len(), "concurrent backend joined");
        Ok(Reduction::from_partials(&partials))
    }

    fn name(&self) -> &str {
        "concurrent"
    }
}
