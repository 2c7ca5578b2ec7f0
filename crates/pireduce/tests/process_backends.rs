//! Process-based backends driven against the real worker binary.

use std::sync::Arc;
use std::time::Duration;

use pireduce_core::backends::{ConcurrentBackend, ProcessBackend, ProcessPoolBackend, RemoteBackend};
use pireduce_core::{segment_all, Backend, CommandTransport, LeibnizKernel, WorkerCommand};

fn worker() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_pireduce"))
}

fn reference(total: u64, size: u64) -> f64 {
    let segments = segment_all(total, size).unwrap();
    ConcurrentBackend::new()
        .reduce(&segments, &LeibnizKernel::new())
        .unwrap()
        .aggregate
}

#[test]
fn processes_match_in_process_sum() {
    let segments = segment_all(10_000, 1_000).unwrap();
    let reduction = ProcessBackend::new(worker())
        .reduce(&segments, &LeibnizKernel::new())
        .unwrap();
    assert_eq!(reduction.completed, 10);
    assert!((reduction.aggregate - reference(10_000, 1_000)).abs() < 1e-9);
}

#[test]
fn process_pool_matches_in_process_sum() {
    let segments = segment_all(10_000, 500).unwrap();
    for size in [1, 3, 50] {
        let reduction = ProcessPoolBackend::new(size, worker())
            .unwrap()
            .reduce(&segments, &LeibnizKernel::new())
            .unwrap();
        assert_eq!(reduction.completed, 20, "pool size {size}");
        assert!((reduction.aggregate - reference(10_000, 500)).abs() < 1e-9);
    }
}

#[test]
fn local_transport_matches_in_process_sum() {
    let transport = CommandTransport::new(worker(), worker());
    let backend = RemoteBackend::new(
        vec!["local".into()],
        Duration::from_secs(30),
        Arc::new(transport),
    )
    .unwrap();
    let segments = segment_all(5_000, 1_000).unwrap();
    let reduction = backend.reduce(&segments, &LeibnizKernel::new()).unwrap();
    assert!(reduction.is_complete());
    assert!((reduction.aggregate - reference(5_000, 1_000)).abs() < 1e-9);
}

#[cfg(unix)]
#[test]
fn unreachable_endpoint_contributes_zero() {
    // `false` stands in for an ssh client that cannot connect.
    let transport = CommandTransport::new(worker(), worker()).with_ssh_program("false");
    let backend = RemoteBackend::new(
        vec!["local".into(), "unreachable".into()],
        Duration::from_secs(30),
        Arc::new(transport),
    )
    .unwrap();
    let segments = segment_all(4_000, 1_000).unwrap();
    let reduction = backend.reduce(&segments, &LeibnizKernel::new()).unwrap();

    let expected: f64 = segments
        .iter()
        .step_by(2)
        .map(|s| LeibnizKernel::sum(*s))
        .fold(0.0, |acc, p| acc + p);
    assert!((reduction.aggregate - expected).abs() < 1e-12);
    assert_eq!(reduction.completed, 2);
    let failed: Vec<_> = reduction.failures.iter().map(|f| f.index).collect();
    assert_eq!(failed, [1, 3]);
    assert!(reduction
        .failures
        .iter()
        .all(|f| f.endpoint.as_deref() == Some("unreachable")));
}
