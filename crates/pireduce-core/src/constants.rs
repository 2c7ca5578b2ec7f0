//! Constants for segmentation defaults, worker modes, and exit codes.

/// Constant the derived estimate is compared against.
pub const REFERENCE_CONSTANT: f64 = std::f64::consts::PI;

/// Factor turning the Leibniz aggregate into an estimate of pi.
pub const ESTIMATE_SCALE: f64 = 4.0;

/// Terms with magnitude at or below this value are dropped by the pipeline
/// consumer's filter stage.
pub const NEAR_ZERO_TERM: f64 = 1e-10;

/// Default total number of series terms.
pub const DEFAULT_ITERATIONS: u64 = 1_000_000;

/// Default number of terms per segment.
pub const DEFAULT_SEGMENT_SIZE: u64 = 1_000_000;

/// Default per-call timeout for remote dispatch, in seconds.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 60;

/// Pipeline queue slots per consumer when no explicit capacity is given.
pub const QUEUE_SLOTS_PER_CONSUMER: usize = 4;

/// Flag that puts the binary into single-segment mode.
pub const INTERNAL_FLAG: &str = "--internal";

/// Flag that puts the binary into long-lived pool worker mode.
pub const WORKER_FLAG: &str = "--worker";

/// Endpoint name that makes the command transport run the worker locally
/// instead of going through ssh.
pub const LOCAL_ENDPOINT: &str = "local";

/// Process exit codes.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Generic error.
    pub const ERROR_GENERIC: i32 = 1;
    /// The segment evaluator failed.
    pub const ERROR_EVALUATOR: i32 = 3;
    /// Invalid configuration.
    pub const ERROR_CONFIG: i32 = 4;
    /// A worker thread or process failed.
    pub const ERROR_WORKER: i32 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scale_maps_series_to_pi() {
        assert!((ESTIMATE_SCALE * std::f64::consts::FRAC_PI_4 - REFERENCE_CONSTANT).abs() < 1e-15);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            exit_codes::SUCCESS,
            exit_codes::ERROR_GENERIC,
            exit_codes::ERROR_EVALUATOR,
            exit_codes::ERROR_CONFIG,
            exit_codes::ERROR_WORKER,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
