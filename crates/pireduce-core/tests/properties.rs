//! Property-based tests for segmentation and backend equivalence.
//!
//! These tests drive the in-process backends through the public `Backend`
//! trait and compare them against a sequential fold.

use proptest::prelude::*;

use pireduce_core::backends::{ConcurrentBackend, PipelineBackend, ThreadPoolBackend};
use pireduce_core::kernel::{LeibnizKernel, SegmentKernel};
use pireduce_core::{reduce, segment_all, Backend, Segment};

fn sequential(segments: &[Segment]) -> f64 {
    let kernel = LeibnizKernel::new();
    let partials: Vec<f64> = segments
        .iter()
        .map(|s| kernel.evaluate(*s).unwrap())
        .collect();
    reduce(&partials)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Segments cover [0, total) contiguously, in order, exactly once.
    #[test]
    fn segments_partition_the_range(total in 0u64..50_000, size in 1u64..5_000) {
        let segments = segment_all(total, size).unwrap();
        prop_assert_eq!(segments.len() as u64, total.div_ceil(size));

        let mut next = 0;
        for (i, seg) in segments.iter().enumerate() {
            prop_assert_eq!(seg.start, next, "gap before segment {}", i);
            prop_assert!(seg.count >= 1 && seg.count <= size);
            if i + 1 < segments.len() {
                prop_assert_eq!(seg.count, size, "only the last segment may be short");
            }
            next = seg.end();
        }
        prop_assert_eq!(next, total);
    }

    /// A zero-count segment always evaluates to exactly 0.
    #[test]
    fn empty_segment_is_zero(start in any::<u64>().prop_map(|s| s / 2)) {
        let kernel = LeibnizKernel::new();
        prop_assert_eq!(kernel.evaluate(Segment::new(start, 0)).unwrap(), 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every in-process backend agrees with the sequential sum.
    #[test]
    fn in_process_backends_agree(
        total in 0u64..20_000,
        size in 100u64..4_000,
        workers in 1usize..6,
    ) {
        let segments = segment_all(total, size).unwrap();
        let expected = sequential(&segments);
        let kernel = LeibnizKernel::new();

        let backends: Vec<Box<dyn Backend>> = vec![
            Box::new(ConcurrentBackend::new()),
            Box::new(ThreadPoolBackend::new(workers).unwrap()),
            Box::new(PipelineBackend::with_consumers(workers).unwrap()),
        ];
        for backend in backends {
            let reduction = backend.reduce(&segments, &kernel).unwrap();
            prop_assert!(
                (reduction.aggregate - expected).abs() < 1e-9,
                "{} diverged: {} vs {}",
                backend.name(),
                reduction.aggregate,
                expected
            );
            prop_assert_eq!(reduction.completed, segments.len());
        }
    }
}

#[test]
fn ten_term_series_matches_closed_loop() {
    let segments = segment_all(10, 10).unwrap();
    let expected: f64 = (0..10)
        .map(|k: i32| {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            sign / (2.0 * f64::from(k) + 1.0)
        })
        .sum();
    let reduction = ConcurrentBackend::new()
        .reduce(&segments, &LeibnizKernel::new())
        .unwrap();
    assert!((reduction.aggregate - expected).abs() < 1e-15);
}
