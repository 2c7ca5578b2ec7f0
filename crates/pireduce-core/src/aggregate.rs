//! Combining partial results into the aggregate.

use parking_lot::Mutex;
use serde::Serialize;

use crate::segment::Segment;

/// Sum of partial results, folded left from `0.0`.
///
/// # Example
/// ```
/// use pireduce_core::aggregate::reduce;
///
/// assert_eq!(reduce(&[]), 0.0);
/// assert_eq!(reduce(&[0.25]), 0.25);
/// assert_eq!(reduce(&[0.5, 0.25, 0.25]), 1.0);
/// ```
#[must_use]
pub fn reduce(partials: &[f64]) -> f64 {
    partials.iter().fold(0.0, |acc, partial| acc + partial)
}

/// A segment whose contribution was lost, kept apart from the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentFailure {
    /// Index of the segment in the sequence.
    pub index: usize,
    /// The segment itself.
    pub segment: Segment,
    /// Remote endpoint the segment was dispatched to, if any.
    pub endpoint: Option<String>,
    /// Cause of the failure.
    pub reason: String,
}

/// Outcome of running one backend over a segment sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reduction {
    /// Sum of every partial that was produced.
    pub aggregate: f64,
    /// Number of segments that contributed a partial.
    pub completed: usize,
    /// Segments that contributed nothing because they failed.
    pub failures: Vec<SegmentFailure>,
}

impl Reduction {
    /// Reduction where every segment produced a partial.
    #[must_use]
    pub fn from_partials(partials: &[f64]) -> Self {
        Self {
            aggregate: reduce(partials),
            completed: partials.len(),
            failures: Vec::new(),
        }
    }

    /// Reduction over index-addressed slots; empty slots count as `0.0` and
    /// must be described in `failures`.
    #[must_use]
    pub fn from_slots(slots: &[Option<f64>], failures: Vec<SegmentFailure>) -> Self {
        let partials: Vec<f64> = slots.iter().map(|slot| slot.unwrap_or(0.0)).collect();
        Self {
            aggregate: reduce(&partials),
            completed: slots.iter().filter(|slot| slot.is_some()).count(),
            failures,
        }
    }

    /// Whether every segment contributed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct AccumulatorState {
    total: f64,
    contributions: usize,
}

/// Running total shared by several workers; each add is one locked
/// read-modify-write.
#[derive(Debug, Default)]
pub struct SharedAccumulator {
    state: Mutex<AccumulatorState>,
}

impl SharedAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one partial result.
    pub fn add(&self, partial: f64) {
        let mut state = self.state.lock();
        state.total += partial;
        state.contributions += 1;
    }

    /// Current total and number of contributions.
    #[must_use]
    pub fn snapshot(&self) -> (f64, usize) {
        let state = self.state.lock();
        (state.total, state.contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_empty_and_single() {
        assert_eq!(reduce(&[]), 0.0);
        assert_eq!(reduce(&[-0.75]), -0.75);
    }

    #[test]
    fn reduce_order_insensitive_within_tolerance() {
        let partials: Vec<f64> = (0..100).map(|i| 1.0 / f64::from(i + 1)).collect();
        let mut reversed = partials.clone();
        reversed.reverse();
        assert!((reduce(&partials) - reduce(&reversed)).abs() < 1e-12);
    }

    #[test]
    fn reduction_from_slots_counts_missing_as_zero() {
        let failure = SegmentFailure {
            index: 1,
            segment: Segment::new(10, 10),
            endpoint: Some("host-b".into()),
            reason: "timeout".into(),
        };
        let reduction = Reduction::from_slots(&[Some(0.5), None, Some(0.25)], vec![failure]);
        assert_eq!(reduction.aggregate, 0.75);
        assert_eq!(reduction.completed, 2);
        assert!(!reduction.is_complete());
    }

    #[test]
    fn reduction_from_partials_is_complete() {
        let reduction = Reduction::from_partials(&[1.0, 2.0]);
        assert_eq!(reduction.aggregate, 3.0);
        assert_eq!(reduction.completed, 2);
        assert!(reduction.is_complete());
    }

    #[test]
    fn accumulator_concurrent_adds() {
        let acc = SharedAccumulator::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        acc.add(0.5);
                    }
                });
            }
        });
        let (total, contributions) = acc.snapshot();
        assert_eq!(total, 400.0);
        assert_eq!(contributions, 800);
    }
}
