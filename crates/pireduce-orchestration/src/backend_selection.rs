//! Backend selection logic.
//!
//! The front end exposes one flag per backend. Exactly one of them must be
//! set; the selection is turned into a `BackendConfig` here.

use std::sync::Arc;
use std::time::Duration;

use pireduce_core::constants::QUEUE_SLOTS_PER_CONSUMER;
use pireduce_core::{BackendConfig, BackendKind, ReductionError, RemoteEval, WorkerCommand};

/// Backend flags as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendSelection {
    pub concurrent: bool,
    /// Thread pool size, already resolved from "auto".
    pub thread_pool: Option<usize>,
    pub processes: bool,
    /// Process pool size.
    pub pool: Option<usize>,
    /// Remote endpoints.
    pub hosts: Option<Vec<String>>,
    /// Pipeline consumer count.
    pub producer_consumer: Option<usize>,
}

impl BackendSelection {
    /// Kinds whose flag is set, in presentation order.
    #[must_use]
    pub fn selected(&self) -> Vec<BackendKind> {
        let flags = [
            (BackendKind::Concurrent, self.concurrent),
            (BackendKind::ThreadPool, self.thread_pool.is_some()),
            (BackendKind::Processes, self.processes),
            (BackendKind::ProcessPool, self.pool.is_some()),
            (BackendKind::Remote, self.hosts.is_some()),
            (BackendKind::Pipeline, self.producer_consumer.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(kind, set)| set.then_some(kind))
            .collect()
    }
}

/// Everything a backend may need besides its own flag.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    /// Command that re-executes this program as a worker.
    pub worker: WorkerCommand,
    /// Remote dispatch timeout.
    pub timeout: Duration,
    /// Transport for remote dispatch.
    pub transport: Arc<dyn RemoteEval>,
    /// Pipeline queue capacity; `None` or `0` derives it from the consumer count.
    pub queue_capacity: Option<usize>,
}

/// Turn the front-end flags into exactly one validated `BackendConfig`.
///
/// # Errors
///
/// Returns `InvalidConfiguration` when no backend or more than one backend
/// is selected, or when the selected backend's parameters are invalid.
pub fn select_backend(
    selection: &BackendSelection,
    context: &SelectionContext,
) -> Result<BackendConfig, ReductionError> {
    let selected = selection.selected();
    let kind = match selected.as_slice() {
        [] => {
            return Err(ReductionError::InvalidConfiguration(
                "no backend selected".into(),
            ))
        }
        [kind] => *kind,
        several => {
            let names: Vec<&str> = several.iter().map(|k| k.name()).collect();
            return Err(ReductionError::InvalidConfiguration(format!(
                "backends are mutually exclusive, got: {}",
                names.join(", ")
            )));
        }
    };

    let config = match kind {
        BackendKind::Concurrent => BackendConfig::Concurrent,
        BackendKind::ThreadPool => BackendConfig::ThreadPool {
            workers: selection.thread_pool.unwrap_or_default(),
        },
        BackendKind::Processes => BackendConfig::Processes {
            worker: context.worker.clone(),
        },
        BackendKind::ProcessPool => BackendConfig::ProcessPool {
            size: selection.pool.unwrap_or_default(),
            worker: context.worker.clone(),
        },
        BackendKind::Remote => BackendConfig::Remote {
            endpoints: selection.hosts.clone().unwrap_or_default(),
            timeout: context.timeout,
            transport: Arc::clone(&context.transport),
        },
        BackendKind::Pipeline => {
            let consumers = selection.producer_consumer.unwrap_or_default();
            let capacity = match context.queue_capacity {
                Some(capacity) if capacity > 0 => capacity,
                _ => consumers * QUEUE_SLOTS_PER_CONSUMER,
            };
            BackendConfig::Pipeline {
                consumers,
                capacity,
            }
        }
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pireduce_core::{RemoteError, Segment};

    #[derive(Debug)]
    struct NullTransport;

    impl RemoteEval for NullTransport {
        fn eval(&self, _: &str, _: Segment, _: Duration) -> Result<f64, RemoteError> {
            Ok(0.0)
        }
    }

    fn context() -> SelectionContext {
        SelectionContext {
            worker: WorkerCommand::new("pireduce"),
            timeout: Duration::from_secs(60),
            transport: Arc::new(NullTransport),
            queue_capacity: None,
        }
    }

    #[test]
    fn none_selected() {
        let err = select_backend(&BackendSelection::default(), &context()).unwrap_err();
        assert!(err.to_string().contains("no backend selected"));
    }

    #[test]
    fn two_selected() {
        let selection = BackendSelection {
            concurrent: true,
            pool: Some(2),
            ..Default::default()
        };
        let err = select_backend(&selection, &context()).unwrap_err();
        assert!(matches!(err, ReductionError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("concurrent, process-pool"));
    }

    #[test]
    fn each_flag_selects_its_kind() {
        let cases = [
            (
                BackendSelection {
                    concurrent: true,
                    ..Default::default()
                },
                BackendKind::Concurrent,
            ),
            (
                BackendSelection {
                    thread_pool: Some(4),
                    ..Default::default()
                },
                BackendKind::ThreadPool,
            ),
            (
                BackendSelection {
                    processes: true,
                    ..Default::default()
                },
                BackendKind::Processes,
            ),
            (
                BackendSelection {
                    pool: Some(2),
                    ..Default::default()
                },
                BackendKind::ProcessPool,
            ),
            (
                BackendSelection {
                    hosts: Some(vec!["a".into(), "b".into()]),
                    ..Default::default()
                },
                BackendKind::Remote,
            ),
            (
                BackendSelection {
                    producer_consumer: Some(3),
                    ..Default::default()
                },
                BackendKind::Pipeline,
            ),
        ];
        for (selection, kind) in cases {
            let config = select_backend(&selection, &context()).unwrap();
            assert_eq!(config.kind(), kind);
        }
    }

    #[test]
    fn pipeline_capacity_defaults_per_consumer() {
        let selection = BackendSelection {
            producer_consumer: Some(3),
            ..Default::default()
        };
        let config = select_backend(&selection, &context()).unwrap();
        assert!(matches!(
            config,
            BackendConfig::Pipeline {
                consumers: 3,
                capacity: 12
            }
        ));

        let mut ctx = context();
        ctx.queue_capacity = Some(1);
        let config = select_backend(&selection, &ctx).unwrap();
        assert!(matches!(config, BackendConfig::Pipeline { capacity: 1, .. }));
    }

    #[test]
    fn invalid_parameters_rejected() {
        for selection in [
            BackendSelection {
                pool: Some(0),
                ..Default::default()
            },
            BackendSelection {
                producer_consumer: Some(0),
                ..Default::default()
            },
            BackendSelection {
                hosts: Some(Vec::new()),
                ..Default::default()
            },
            BackendSelection {
                thread_pool: Some(0),
                ..Default::default()
            },
        ] {
            assert!(select_backend(&selection, &context()).is_err());
        }
    }
}
