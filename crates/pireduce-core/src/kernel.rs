//! Segment kernels: the pure per-segment evaluation function.
//!
//! `SegmentKernel` is the injection point consumed by every in-process
//! backend. `LeibnizKernel` is the default; `FnKernel` adapts any closure.

use crate::segment::Segment;

/// Error raised by a kernel for one segment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("evaluator failed on segment {segment}: {reason}")]
pub struct EvaluatorError {
    /// The segment being evaluated.
    pub segment: Segment,
    /// Human-readable cause.
    pub reason: String,
}

impl EvaluatorError {
    /// Create a new evaluator error for `segment`.
    pub fn new(segment: Segment, reason: impl Into<String>) -> Self {
        Self {
            segment,
            reason: reason.into(),
        }
    }
}

/// Pure function mapping a segment to its partial result.
pub trait SegmentKernel: Send + Sync {
    /// Evaluate the segment. Must return `Ok(0.0)` for an empty segment.
    fn evaluate(&self, segment: Segment) -> Result<f64, EvaluatorError>;

    /// Evaluate the segment, skipping terms whose magnitude is at most
    /// `epsilon`. Kernels without term-level access evaluate normally.
    fn evaluate_filtered(&self, segment: Segment, epsilon: f64) -> Result<f64, EvaluatorError> {
        let _ = epsilon;
        self.evaluate(segment)
    }

    /// Name of the kernel, for logs.
    fn name(&self) -> &str;

    /// True when the worker binary evaluates this same kernel, so the
    /// process backends may run it out of process.
    fn is_worker_builtin(&self) -> bool {
        false
    }
}

/// The k-th Leibniz term, `(-1)^k / (2k + 1)`.
#[inline]
#[must_use]
pub fn leibniz_term(k: u64) -> f64 {
    let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
    sign / (2.0 * k as f64 + 1.0)
}

/// Sequential partial sum of the Leibniz series over a segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeibnizKernel;

impl LeibnizKernel {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Infallible evaluation, used by the single-segment worker mode.
    ///
    /// # Example
    /// ```
    /// use pireduce_core::kernel::LeibnizKernel;
    /// use pireduce_core::segment::Segment;
    ///
    /// let sum = LeibnizKernel::sum(Segment::new(0, 3));
    /// assert!((sum - (1.0 - 1.0 / 3.0 + 1.0 / 5.0)).abs() < 1e-15);
    /// assert_eq!(LeibnizKernel::sum(Segment::new(42, 0)), 0.0);
    /// ```
    #[must_use]
    pub fn sum(segment: Segment) -> f64 {
        segment
            .indices()
            .map(leibniz_term)
            .fold(0.0, |acc, term| acc + term)
    }
}

impl SegmentKernel for LeibnizKernel {
    fn evaluate(&self, segment: Segment) -> Result<f64, EvaluatorError> {
        Ok(Self::sum(segment))
    }

    fn evaluate_filtered(&self, segment: Segment, epsilon: f64) -> Result<f64, EvaluatorError> {
        Ok(segment
            .indices()
            .map(leibniz_term)
            .filter(|term| term.abs() > epsilon)
            .fold(0.0, |acc, term| acc + term))
    }

    fn name(&self) -> &str {
        "Leibniz"
    }

    fn is_worker_builtin(&self) -> bool {
        true
    }
}

/// Adapter turning a closure into a kernel.
pub struct FnKernel<F> {
    name: String,
    f: F,
}

impl<F> FnKernel<F>
where
    F: Fn(Segment) -> Result<f64, EvaluatorError> + Send + Sync,
{
    /// Wrap `f` under the given name.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> SegmentKernel for FnKernel<F>
where
    F: Fn(Segment) -> Result<f64, EvaluatorError> + Send + Sync,
{
    fn evaluate(&self, segment: Segment) -> Result<f64, EvaluatorError> {
        (self.f)(segment)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
