//! Remote dispatch: one call per segment through a `RemoteEval` capability.
//!
//! Segments go to endpoints round-robin and every call is dispatched at
//! once on its own thread. The parent waits for all calls against a single
//! deadline `timeout` after dispatch; a call that errors or misses the
//! deadline contributes `0.0` and is recorded as a failure. This is the
//! only backend that completes despite partial failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{error, info};

use crate::aggregate::{Reduction, SegmentFailure};
use crate::backend::{Backend, DispatchPhase, PhaseTracker, ReductionError};
use crate::kernel::SegmentKernel;
use crate::segment::Segment;
use crate::transport::{RemoteError, RemoteEval};

/// Remote dispatch backend.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    endpoints: Vec<String>,
    timeout: Duration,
    transport: Arc<dyn RemoteEval>,
}

impl RemoteBackend {
    /// Backend dispatching over `transport` to `endpoints`.
    pub fn new(
        endpoints: Vec<String>,
        timeout: Duration,
        transport: Arc<dyn RemoteEval>,
    ) -> Result<Self, ReductionError> {
        if endpoints.is_empty() {
            return Err(ReductionError::InvalidConfiguration(
                "remote dispatch needs at least one endpoint".into(),
            ));
        }
        if timeout.is_zero() {
            return Err(ReductionError::InvalidConfiguration(
                "remote timeout must be positive".into(),
            ));
        }
        Ok(Self {
            endpoints,
            timeout,
            transport,
        })
    }

    /// Endpoint owning the segment at `index`.
    #[must_use]
    pub fn endpoint_for(&self, index: usize) -> &str {
        &self.endpoints[index % self.endpoints.len()]
    }

    fn dispatch(
        &self,
        index: usize,
        segment: Segment,
    ) -> Result<Receiver<Result<f64, RemoteError>>, ReductionError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let transport = Arc::clone(&self.transport);
        let endpoint = self.endpoint_for(index).to_string();
        let timeout = self.timeout;
        std::thread::Builder::new()
            .name(format!("remote-{index}"))
            .spawn(move || {
                // The receiver may be gone after a timeout; the late result is dropped.
                let _ = tx.send(transport.eval(&endpoint, segment, timeout));
            })?;
        Ok(rx)
    }
}

impl Backend for RemoteBackend {
    /// The in-process `kernel` is not used: remote workers run their own.
    fn reduce(
        &self,
        segments: &[Segment],
        _kernel: &dyn SegmentKernel,
    ) -> Result<Reduction, ReductionError> {
        let mut phase = PhaseTracker::new("remote");

        phase.advance(DispatchPhase::Dispatching);
        let mut pending = Vec::with_capacity(segments.len());
        for (index, &segment) in segments.iter().enumerate() {
            let endpoint = self.endpoint_for(index);
            info!(
                index,
                endpoint,
                start = segment.start,
                count = segment.count,
                "segment dispatched"
            );
            pending.push(self.dispatch(index, segment)?);
        }
        let deadline = Instant::now() + self.timeout;

        phase.advance(DispatchPhase::Awaiting);
        let mut slots = vec![None; segments.len()];
        let mut failures = Vec::new();
        for (index, rx) in pending.into_iter().enumerate() {
            let outcome = match rx.recv_deadline(deadline) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => Err(RemoteError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(RemoteError::Transport("dispatch thread exited without a result".into()))
                }
            };
            match outcome {
                Ok(value) => slots[index] = Some(value),
                Err(err) => {
                    let endpoint = self.endpoint_for(index).to_string();
                    error!(
                        index,
                        endpoint = %endpoint,
                        %err,
                        "remote segment failed, counting it as 0.0"
                    );
                    failures.push(SegmentFailure {
                        index,
                        segment: segments[index],
                        endpoint: Some(endpoint),
                        reason: err.to_string(),
                    });
                }
            }
        }

        phase.advance(DispatchPhase::Aggregating);
        let reduction = Reduction::from_slots(&slots, failures);
        phase.advance(DispatchPhase::Done);
        Ok(reduction)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
