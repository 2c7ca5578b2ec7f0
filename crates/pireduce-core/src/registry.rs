//! Backend factory.

use std::sync::Arc;

use crate::backend::{Backend, BackendKind, ReductionError};
use crate::backends::{
    ConcurrentBackend, PipelineBackend, ProcessBackend, ProcessPoolBackend, RemoteBackend,
    ThreadPoolBackend,
};
use crate::options::BackendConfig;

/// Factory trait for creating backends.
pub trait BackendFactory: Send + Sync {
    /// Validate `config` and build the backend it selects.
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, ReductionError>;

    /// Names of every backend this factory can build.
    fn available(&self) -> Vec<&str>;
}

/// Factory covering the six built-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFactory;

impl DefaultFactory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BackendFactory for DefaultFactory {
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, ReductionError> {
        config.validate()?;
        let backend: Arc<dyn Backend> = match config {
            BackendConfig::Concurrent => Arc::new(ConcurrentBackend::new()),
            BackendConfig::ThreadPool { workers } => Arc::new(ThreadPoolBackend::new(*workers)?),
            BackendConfig::Processes { worker } => Arc::new(ProcessBackend::new(worker.clone())),
            BackendConfig::ProcessPool { size, worker } => {
                Arc::new(ProcessPoolBackend::new(*size, worker.clone())?)
            }
            BackendConfig::Remote {
                endpoints,
                timeout,
                transport,
            } => Arc::new(RemoteBackend::new(
                endpoints.clone(),
                *timeout,
                Arc::clone(transport),
            )?),
            BackendConfig::Pipeline {
                consumers,
                capacity,
            } => Arc::new(PipelineBackend::new(*consumers, *capacity)?),
        };
        Ok(backend)
    }

    fn available(&self) -> Vec<&str> {
        BackendKind::ALL.iter().map(|kind| kind.name()).collect()
    }
}
