//! The six execution strategies.

use std::any::Any;

use crate::backend::ReductionError;
use crate::kernel::SegmentKernel;

pub mod concurrent;
pub mod pipeline;
pub mod process;
pub mod process_pool;
pub mod remote;
pub mod thread_pool;

pub use concurrent::ConcurrentBackend;
pub use pipeline::PipelineBackend;
pub use process::ProcessBackend;
pub use process_pool::ProcessPoolBackend;
pub use remote::RemoteBackend;
pub use thread_pool::ThreadPoolBackend;

/// Reject kernels the worker binary cannot evaluate.
pub(crate) fn require_worker_builtin(
    backend: &str,
    kernel: &dyn SegmentKernel,
) -> Result<(), ReductionError> {
    if kernel.is_worker_builtin() {
        return Ok(());
    }
    Err(ReductionError::InvalidConfiguration(format!(
        "the {backend} backend only runs the worker's built-in kernel, not {}",
        kernel.name()
    )))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
