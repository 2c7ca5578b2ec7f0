//! Splitting the index space `[0, total)` into contiguous segments.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::backend::ReductionError;

/// A contiguous range of series indices evaluated as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// First index covered by the segment.
    pub start: u64,
    /// Number of indices covered.
    pub count: u64,
}

impl Segment {
    /// Create a new segment covering `[start, start + count)`.
    #[must_use]
    pub const fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }

    /// One past the last index covered.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.count
    }

    /// Whether the segment covers no indices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The covered indices, in evaluation order.
    #[must_use]
    pub fn indices(&self) -> Range<u64> {
        self.start..self.end()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// Split `[0, total)` into `ceil(total / size)` segments of `size` indices,
/// the last one possibly shorter.
///
/// # Example
/// ```
/// use pireduce_core::segment::{segment_all, Segment};
///
/// let segments = segment_all(25, 10).unwrap();
/// assert_eq!(
///     segments,
///     vec![Segment::new(0, 10), Segment::new(10, 10), Segment::new(20, 5)]
/// );
/// assert!(segment_all(0, 10).unwrap().is_empty());
/// assert!(segment_all(10, 0).is_err());
/// ```
pub fn segment_all(total: u64, size: u64) -> Result<Vec<Segment>, ReductionError> {
    if size == 0 {
        return Err(ReductionError::InvalidConfiguration(
            "segment size must be positive".into(),
        ));
    }

    let count = total.div_ceil(size);
    Ok((0..count)
        .map(|i| {
            let start = i * size;
            Segment::new(start, size.min(total - start))
        })
        .collect())
}
