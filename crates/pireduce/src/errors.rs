//! Error handling and exit codes.

use pireduce_core::constants::exit_codes;
use pireduce_core::ReductionError;

/// Exit code for a reduction error.
#[must_use]
pub fn handle_error(err: &ReductionError) -> i32 {
    match err {
        ReductionError::InvalidConfiguration(_) => exit_codes::ERROR_CONFIG,
        ReductionError::Evaluator(_) => exit_codes::ERROR_EVALUATOR,
        ReductionError::WorkerFailure { .. }
        | ReductionError::Spawn(_)
        | ReductionError::Panicked(_) => exit_codes::ERROR_WORKER,
    }
}

/// Exit code for any application error; errors that do not wrap a
/// `ReductionError` are generic.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ReductionError>())
        .map_or(exit_codes::ERROR_GENERIC, handle_error)
}
