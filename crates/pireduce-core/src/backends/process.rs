//! One OS process per segment.
//!
//! Every segment is evaluated by a fresh child running the single-segment
//! worker mode. Children share no memory with the parent; each child's
//! printed partial is drained by a supervising thread and folded into a
//! locked `SharedAccumulator`. A child that crashes, exits non-zero, or
//! prints something other than one float aborts the run.

use std::process::Child;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::aggregate::{Reduction, SharedAccumulator};
use crate::backend::{Backend, DispatchPhase, PhaseTracker, ReductionError};
use crate::backends::require_worker_builtin;
use crate::kernel::SegmentKernel;
use crate::segment::Segment;
use crate::subprocess::{finish, parse_partial, spawn_captured, WorkerCommand};

/// Process-isolated backend.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    worker: WorkerCommand,
}

impl ProcessBackend {
    #[must_use]
    pub fn new(worker: WorkerCommand) -> Self {
        Self { worker }
    }

    fn launch_all(&self, segments: &[Segment]) -> Result<Vec<Child>, ReductionError> {
        let mut children = Vec::with_capacity(segments.len());
        for (index, &segment) in segments.iter().enumerate() {
            match spawn_captured(self.worker.single_segment(segment)) {
                Ok(child) => children.push(child),
                Err(err) => {
                    for mut child in children {
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    error!(index, %err, "could not launch segment process");
                    return Err(ReductionError::Spawn(err.to_string()));
                }
            }
        }
        Ok(children)
    }
}

impl Backend for ProcessBackend {
    /// Children run the kernel built into the worker binary, so any other
    /// `kernel` is rejected before launch.
    fn reduce(
        &self,
        segments: &[Segment],
        kernel: &dyn SegmentKernel,
    ) -> Result<Reduction, ReductionError> {
        require_worker_builtin(self.name(), kernel)?;
        let mut phase = PhaseTracker::new("processes");

        phase.advance(DispatchPhase::Dispatching);
        let children = self.launch_all(segments)?;
        debug!(processes = children.len(), "segment processes launched");

        phase.advance(DispatchPhase::Awaiting);
        let accumulator = SharedAccumulator::new();
        let failures: Mutex<Vec<(usize, String)>> = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for (index, child) in children.into_iter().enumerate() {
                let accumulator = &accumulator;
                let failures = &failures;
                scope.spawn(move || {
                    match finish(child).and_then(|out| parse_partial(&out)) {
                        Ok(value) => accumulator.add(value),
                        Err(err) => failures.lock().push((index, err.to_string())),
                    }
                });
            }
        });

        phase.advance(DispatchPhase::Aggregating);
        let mut failures = failures.into_inner();
        failures.sort_by_key(|(index, _)| *index);
        if let Some((index, reason)) = failures.into_iter().next() {
            error!(index, %reason, "segment process failed");
            return Err(ReductionError::WorkerFailure { index, reason });
        }

        let (aggregate, completed) = accumulator.snapshot();
        phase.advance(DispatchPhase::Done);
        Ok(Reduction {
            aggregate,
            completed,
            failures: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "processes"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::kernel::LeibnizKernel;
    use crate::segment::segment_all;

    fn shell_worker(script: &str) -> WorkerCommand {
        // Trailing single-segment flags land in $1.. of the script.
        WorkerCommand::new("sh").arg("-c").arg(script).arg("worker")
    }

    #[test]
    fn sums_child_outputs() {
        let backend = ProcessBackend::new(shell_worker("echo 0.25"));
        let segments = segment_all(40, 10).unwrap();
        let reduction = backend.reduce(&segments, &LeibnizKernel::new()).unwrap();
        assert_eq!(reduction.aggregate, 1.0);
        assert_eq!(reduction.completed, 4);
    }

    #[test]
    fn children_receive_segment_bounds() {
        // $3 is the start index, $5 the count.
        let backend = ProcessBackend::new(shell_worker("echo $5"));
        let segments = segment_all(25, 10).unwrap();
        let reduction = backend.reduce(&segments, &LeibnizKernel::new()).unwrap();
        assert_eq!(reduction.aggregate, 25.0);
    }

    #[test]
    fn empty_sequence_launches_nothing() {
        let backend = ProcessBackend::new(WorkerCommand::new("/definitely/not/a/worker"));
        let reduction = backend.reduce(&[], &LeibnizKernel::new()).unwrap();
        assert_eq!(reduction.aggregate, 0.0);
    }

    #[test]
    fn crashed_child_aborts_run() {
        let backend =
            ProcessBackend::new(shell_worker("if [ \"$3\" = 10 ]; then exit 7; fi; echo 1"));
        let segments = segment_all(30, 10).unwrap();
        let err = backend.reduce(&segments, &LeibnizKernel::new()).unwrap_err();
        assert!(matches!(err, ReductionError::WorkerFailure { index: 1, .. }));
    }

    #[test]
    fn garbage_output_aborts_run() {
        let backend = ProcessBackend::new(shell_worker("echo nope"));
        let err = backend
            .reduce(&[Segment::new(0, 1)], &LeibnizKernel::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ReductionError::WorkerFailure { index: 0, reason } if reason.contains("nope")
        ));
    }

    #[test]
    fn custom_kernel_rejected_before_launch() {
        let backend = ProcessBackend::new(WorkerCommand::new("/definitely/not/a/worker"));
        let ones = crate::kernel::FnKernel::new("ones", |_| Ok(1.0));
        let err = backend.reduce(&[Segment::new(0, 1)], &ones).unwrap_err();
        assert!(matches!(err, ReductionError::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let backend = ProcessBackend::new(WorkerCommand::new("/definitely/not/a/worker"));
        let err = backend
            .reduce(&[Segment::new(0, 1)], &LeibnizKernel::new())
            .unwrap_err();
        assert!(matches!(err, ReductionError::Spawn(_)));
    }
}
