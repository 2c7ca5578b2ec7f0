//! Producer/consumer pipeline over a bounded queue.
//!
//! A single producer enqueues `Work` for every segment followed by one
//! `Stop` per consumer. Consumers dequeue until their `Stop`, run the
//! kernel's filtered evaluation, and send `(index, partial)` on a result
//! channel. A kernel error ends only the consumer that hit it; the segment
//! is recorded as a failure and the aggregate undercounts.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, warn};

use crate::aggregate::{Reduction, SegmentFailure};
use crate::backend::{Backend, ReductionError};
use crate::constants::{NEAR_ZERO_TERM, QUEUE_SLOTS_PER_CONSUMER};
use crate::kernel::{EvaluatorError, SegmentKernel};
use crate::segment::Segment;

/// Queue message; `Stop` is the per-consumer termination sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Work { index: usize, segment: Segment },
    Stop,
}

/// Pipeline backend.
#[derive(Debug, Clone, Copy)]
pub struct PipelineBackend {
    consumers: usize,
    capacity: usize,
    epsilon: f64,
}

impl PipelineBackend {
    /// Pipeline with `consumers` workers and a queue of `capacity` slots.
    pub fn new(consumers: usize, capacity: usize) -> Result<Self, ReductionError> {
        if consumers == 0 {
            return Err(ReductionError::InvalidConfiguration(
                "pipeline needs at least one consumer".into(),
            ));
        }
        if capacity == 0 {
            return Err(ReductionError::InvalidConfiguration(
                "pipeline queue capacity must be positive".into(),
            ));
        }
        Ok(Self {
            consumers,
            capacity,
            epsilon: NEAR_ZERO_TERM,
        })
    }

    /// Pipeline with the default queue capacity for `consumers`.
    pub fn with_consumers(consumers: usize) -> Result<Self, ReductionError> {
        Self::new(consumers, consumers.max(1) * QUEUE_SLOTS_PER_CONSUMER)
    }

    #[must_use]
    pub fn consumers(&self) -> usize {
        self.consumers
    }
}

/// Enqueue all work, then one `Stop` per consumer. Returns the number of
/// messages enqueued; stops early once every consumer is gone.
fn produce(queue: &Sender<Message>, segments: &[Segment], consumers: usize) -> usize {
    let work = segments
        .iter()
        .enumerate()
        .map(|(index, &segment)| Message::Work { index, segment });
    let stops = std::iter::repeat(Message::Stop).take(consumers);

    let mut sent = 0;
    for message in work.chain(stops) {
        if queue.send(message).is_err() {
            warn!(sent, "no live consumers left, producer stopping");
            break;
        }
        sent += 1;
    }
    sent
}

fn consume(
    id: usize,
    queue: &Receiver<Message>,
    results: &Sender<(usize, Result<f64, EvaluatorError>)>,
    kernel: &dyn SegmentKernel,
    epsilon: f64,
    processed: &AtomicUsize,
) {
    while let Ok(message) = queue.recv() {
        processed.fetch_add(1, Ordering::Relaxed);
        match message {
            Message::Work { index, segment } => {
                let result = kernel.evaluate_filtered(segment, epsilon);
                let failed = result.is_err();
                if results.send((index, result)).is_err() || failed {
                    break;
                }
            }
            Message::Stop => {
                debug!(consumer = id, "consumer received stop");
                return;
            }
        }
    }
    error!(consumer = id, "consumer aborted before its stop message");
}

impl Backend for PipelineBackend {
    fn reduce(
        &self,
        segments: &[Segment],
        kernel: &dyn SegmentKernel,
    ) -> Result<Reduction, ReductionError> {
        let (queue_tx, queue_rx) = crossbeam_channel::bounded(self.capacity);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let processed = AtomicUsize::new(0);
        let mut slots: Vec<Option<f64>> = vec![None; segments.len()];
        let mut failures = Vec::new();

        let enqueued = std::thread::scope(|scope| -> Result<usize, ReductionError> {
            let producer = std::thread::Builder::new()
                .name("producer".into())
                .spawn_scoped(scope, move || produce(&queue_tx, segments, self.consumers))?;

            for id in 0..self.consumers {
                let queue = queue_rx.clone();
                let results = result_tx.clone();
                let processed = &processed;
                let epsilon = self.epsilon;
                std::thread::Builder::new()
                    .name(format!("consumer-{id}"))
                    .spawn_scoped(scope, move || {
                        consume(id, &queue, &results, kernel, epsilon, processed);
                    })?;
            }
            // Only consumers may hold these, so a dead pipeline disconnects.
            drop(queue_rx);
            drop(result_tx);

            for (index, result) in &result_rx {
                match result {
                    Ok(value) => slots[index] = Some(value),
                    Err(err) => failures.push(SegmentFailure {
                        index,
                        segment: segments[index],
                        endpoint: None,
                        reason: err.to_string(),
                    }),
                }
            }

            producer
                .join()
                .map_err(|_| ReductionError::Panicked("producer thread panicked".into()))
        })?;

        for (index, slot) in slots.iter().enumerate() {
            let reported = failures.iter().any(|f| f.index == index);
            if slot.is_none() && !reported {
                failures.push(SegmentFailure {
                    index,
                    segment: segments[index],
                    endpoint: None,
                    reason: "never dequeued: no live consumers".into(),
                });
            }
        }
        failures.sort_by_key(|f| f.index);

        debug!(
            enqueued,
            processed = processed.load(Ordering::Relaxed),
            consumers = self.consumers,
            "pipeline drained"
        );
        Ok(Reduction::from_slots(&slots, failures))
    }

    fn name(&self) -> &str {
        "pipeline"
    }
}
