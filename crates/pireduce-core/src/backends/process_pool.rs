//! Fixed-size pool of long-lived worker processes.
//!
//! The parent enqueues every segment on a shared work queue, then starts
//! `min(size, segments)` pool workers. One supervising thread per worker
//! pulls segments off the queue and exchanges protocol lines with its
//! child, so at most `size` processes exist at any time.

use std::io::{BufReader, BufWriter};
use std::process::{Child, ChildStdin, ChildStdout, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;
use tracing::{debug, error};

use crate::aggregate::Reduction;
use crate::backend::{Backend, DispatchPhase, PhaseTracker, ReductionError};
use crate::backends::require_worker_builtin;
use crate::kernel::SegmentKernel;
use crate::protocol::{read_message, write_message, ProtocolError, WorkerReply, WorkerRequest};
use crate::segment::Segment;
use crate::subprocess::WorkerCommand;

/// Process pool backend.
#[derive(Debug, Clone)]
pub struct ProcessPoolBackend {
    size: usize,
    worker: WorkerCommand,
}

/// Results gathered by one supervising thread.
type WorkerOutcome = Result<Vec<(usize, f64)>, (usize, String)>;

impl ProcessPoolBackend {
    /// Pool of at most `size` worker processes.
    pub fn new(size: usize, worker: WorkerCommand) -> Result<Self, ReductionError> {
        if size == 0 {
            return Err(ReductionError::InvalidConfiguration(
                "process pool size must be positive".into(),
            ));
        }
        Ok(Self { size, worker })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    fn launch(&self) -> Result<(Child, ChildStdin, ChildStdout), ReductionError> {
        let mut child = self
            .worker
            .pool_worker()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => Ok((child, stdin, stdout)),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ReductionError::Spawn("pool worker pipes unavailable".into()))
            }
        }
    }
}

/// Feed queued segments to one worker until the queue drains, the run
/// aborts, or the worker misbehaves.
fn supervise(
    mut child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    queue: &Receiver<(usize, Segment)>,
    aborted: &AtomicBool,
) -> WorkerOutcome {
    let mut writer = BufWriter::new(stdin);
    let mut reader = BufReader::new(stdout);
    let mut partials = Vec::new();
    let mut failure = None;

    while !aborted.load(Ordering::Relaxed) {
        let Ok((index, segment)) = queue.recv() else {
            break;
        };
        match exchange(&mut writer, &mut reader, index, segment) {
            Ok(value) => partials.push((index, value)),
            Err(reason) => {
                aborted.store(true, Ordering::Relaxed);
                failure = Some((index, reason));
                break;
            }
        }
    }

    let _ = write_message(&mut writer, &WorkerRequest::Shutdown);
    drop(writer);
    match (failure, child.wait()) {
        (Some(failure), _) => Err(failure),
        (None, Ok(status)) if status.success() => Ok(partials),
        (None, Ok(status)) => Err((
            partials.last().map_or(0, |(index, _)| *index),
            format!("pool worker exited with {status}"),
        )),
        (None, Err(err)) => Err((0, err.to_string())),
    }
}

fn exchange(
    writer: &mut BufWriter<ChildStdin>,
    reader: &mut BufReader<ChildStdout>,
    index: usize,
    segment: Segment,
) -> Result<f64, String> {
    let request = WorkerRequest::Evaluate { index, segment };
    write_message(writer, &request).map_err(|e: ProtocolError| e.to_string())?;
    match read_message::<_, WorkerReply>(reader) {
        Ok(Some(WorkerReply::Partial { index: got, value })) if got == index => Ok(value),
        Ok(Some(WorkerReply::Partial { index: got, .. })) => {
            Err(format!("reply for segment {got}, expected {index}"))
        }
        Ok(Some(WorkerReply::Failed { reason, .. })) => Err(reason),
        Ok(None) => Err("pool worker closed its output".into()),
        Err(err) => Err(err.to_string()),
    }
}

impl Backend for ProcessPoolBackend {
    /// Pool workers run the kernel built into the worker binary, so any
    /// other `kernel` is rejected before launch.
    fn reduce(
        &self,
        segments: &[Segment],
        kernel: &dyn SegmentKernel,
    ) -> Result<Reduction, ReductionError> {
        require_worker_builtin(self.name(), kernel)?;
        let mut phase = PhaseTracker::new("process-pool");

        phase.advance(DispatchPhase::Dispatching);
        let (tx, queue) = crossbeam_channel::unbounded();
        for (index, &segment) in segments.iter().enumerate() {
            tx.send((index, segment))
                .map_err(|e| ReductionError::Spawn(e.to_string()))?;
        }
        drop(tx);

        let mut workers = Vec::new();
        for _ in 0..self.size.min(segments.len()) {
            match self.launch() {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    for (mut child, stdin, _) in workers {
                        drop(stdin);
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    return Err(err);
                }
            }
        }
        debug!(processes = workers.len(), queued = segments.len(), "pool workers launched");

        phase.advance(DispatchPhase::Awaiting);
        let aborted = AtomicBool::new(false);
        let outcomes: Vec<WorkerOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = workers
                .into_iter()
                .map(|(child, stdin, stdout)| {
                    let queue = &queue;
                    let aborted = &aborted;
                    scope.spawn(move || supervise(child, stdin, stdout, queue, aborted))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err((0, "supervisor thread panicked".into())))
                })
                .collect()
        });

        phase.advance(DispatchPhase::Aggregating);
        let mut slots: Vec<Option<f64>> = vec![None; segments.len()];
        let mut first_failure: Option<(usize, String)> = None;
        for outcome in outcomes {
            match outcome {
                Ok(partials) => {
                    for (index, value) in partials {
                        slots[index] = Some(value);
                    }
                }
                Err((index, reason)) => {
                    if first_failure.as_ref().map_or(true, |(seen, _)| index < *seen) {
                        first_failure = Some((index, reason));
                    }
                }
            }
        }
        if let Some((index, reason)) = first_failure {
            error!(index, %reason, "pool worker failed");
            return Err(ReductionError::WorkerFailure { index, reason });
        }
        if let Some(index) = slots.iter().position(Option::is_none) {
            return Err(ReductionError::WorkerFailure {
                index,
                reason: "segment was never evaluated".into(),
            });
        }

        let reduction = Reduction::from_slots(&slots, Vec::new());
        phase.advance(DispatchPhase::Done);
        Ok(reduction)
    }

    fn name(&self) -> &str {
        "process-pool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{FnKernel, LeibnizKernel};

    #[test]
    fn rejects_zero_size() {
        assert!(matches!(
            ProcessPoolBackend::new(0, WorkerCommand::new("pireduce")),
            Err(ReductionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn empty_sequence_launches_nothing() {
        let backend =
            ProcessPoolBackend::new(4, WorkerCommand::new("/definitely/not/a/worker")).unwrap();
        let reduction = backend.reduce(&[], &LeibnizKernel::new()).unwrap();
        assert_eq!(reduction.aggregate, 0.0);
        assert_eq!(reduction.completed, 0);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let backend =
            ProcessPoolBackend::new(2, WorkerCommand::new("/definitely/not/a/worker")).unwrap();
        let err = backend
            .reduce(&[Segment::new(0, 1)], &LeibnizKernel::new())
            .unwrap_err();
        assert!(matches!(err, ReductionError::Spawn(_)));
    }

    #[test]
    fn custom_kernel_rejected_before_launch() {
        let backend =
            ProcessPoolBackend::new(2, WorkerCommand::new("/definitely/not/a/worker")).unwrap();
        let ones = FnKernel::new("ones", |_| Ok(1.0));
        let err = backend.reduce(&[Segment::new(0, 1)], &ones).unwrap_err();
        assert!(matches!(err, ReductionError::InvalidConfiguration(_)));
    }

    /// Protocol-speaking shell worker that logs its pid to `$1` and
    /// answers every request with 1.0.
    #[cfg(unix)]
    fn pid_logging_worker(log: &std::path::Path) -> WorkerCommand {
        let script = r#"echo $$ >> "$1"
while read -r line; do
  case "$line" in
    *shutdown*) exit 0 ;;
  esac
  index=$(printf '%s\n' "$line" | sed 's/.*"index":\([0-9]*\).*/\1/')
  printf '{"type":"partial","index":%s,"value":1.0}\n' "$index"
done"#;
        WorkerCommand::new("sh")
            .arg("-c")
            .arg(script)
            .arg("worker")
            .arg(log.to_string_lossy())
    }

    #[cfg(unix)]
    fn distinct_pids(log: &std::path::Path) -> usize {
        let pids: std::collections::HashSet<String> = std::fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        pids.len()
    }

    #[cfg(unix)]
    #[test]
    fn never_more_processes_than_pool_size() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("pids");
        let backend = ProcessPoolBackend::new(3, pid_logging_worker(&log)).unwrap();
        let segments = crate::segment::segment_all(200, 10).unwrap();
        let reduction = backend.reduce(&segments, &LeibnizKernel::new()).unwrap();
        assert_eq!(reduction.aggregate, 20.0);
        assert_eq!(reduction.completed, 20);
        assert_eq!(distinct_pids(&log), 3);
    }

    #[cfg(unix)]
    #[test]
    fn one_process_per_segment_when_pool_is_larger() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("pids");
        let backend = ProcessPoolBackend::new(8, pid_logging_worker(&log)).unwrap();
        let segments = crate::segment::segment_all(20, 10).unwrap();
        let reduction = backend.reduce(&segments, &LeibnizKernel::new()).unwrap();
        assert_eq!(reduction.aggregate, 2.0);
        assert_eq!(distinct_pids(&log), 2);
    }

    #[cfg(unix)]
    #[test]
    fn worker_that_exits_immediately_fails_the_run() {
        let worker = WorkerCommand::new("sh").arg("-c").arg("exit 0").arg("worker");
        let backend = ProcessPoolBackend::new(2, worker).unwrap();
        let err = backend
            .reduce(&[Segment::new(0, 5), Segment::new(5, 5)], &LeibnizKernel::new())
            .unwrap_err();
        assert!(matches!(err, ReductionError::WorkerFailure { .. }));
    }
}
