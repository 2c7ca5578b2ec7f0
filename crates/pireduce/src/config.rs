//! Application configuration from CLI flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};

use pireduce_core::constants::{DEFAULT_ITERATIONS, DEFAULT_SEGMENT_SIZE};
use pireduce_orchestration::BackendSelection;

/// pireduce: estimate pi by reducing the Leibniz series over six
/// interchangeable execution backends.
#[derive(Parser, Debug)]
#[command(name = "pireduce", version, about)]
#[allow(clippy::struct_excessive_bools)]
pub struct AppConfig {
    #[command(flatten)]
    pub backend: BackendFlags,

    /// Total number of series terms.
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS, env = "PIREDUCE_ITERATIONS")]
    pub iterations: u64,

    /// Number of terms per segment.
    #[arg(long, default_value_t = DEFAULT_SEGMENT_SIZE)]
    pub seg_size: u64,

    /// Remote call timeout (e.g., "60s", "500ms", "2m").
    #[arg(long, default_value = "60s", value_parser = parse_timeout)]
    pub timeout: Duration,

    /// Pipeline queue capacity (0 = four slots per consumer).
    #[arg(long, default_value_t = 0)]
    pub queue_capacity: usize,

    /// Program path run on remote hosts (defaults to this executable).
    #[arg(long, value_name = "PATH")]
    pub remote_program: Option<PathBuf>,

    /// Repeat the run N times and print statistics.
    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    /// Write a JSON report to this path.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (only output the estimate).
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Generate shell completion.
    #[arg(long, value_enum)]
    pub completion: Option<clap_complete::Shell>,

    /// Evaluate a single segment and print its partial result.
    #[arg(long, hide = true, requires_all = ["start", "count"], conflicts_with = "worker")]
    pub internal: bool,

    /// First index of the single segment.
    #[arg(long, hide = true, requires = "internal")]
    pub start: Option<u64>,

    /// Number of indices in the single segment.
    #[arg(long, hide = true, requires = "internal")]
    pub count: Option<u64>,

    /// Serve evaluation requests on stdin as a pool worker.
    #[arg(long, hide = true)]
    pub worker: bool,
}

/// Backend flags; at most one may be given.
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct BackendFlags {
    /// One thread per segment.
    #[arg(long)]
    pub concurrent: bool,

    /// Fixed-size thread pool (N omitted or 0 = available parallelism).
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "0")]
    pub thread_pool: Option<usize>,

    /// One process per segment.
    #[arg(long)]
    pub processes: bool,

    /// Pool of N long-lived worker processes.
    #[arg(long, value_name = "N")]
    pub pool: Option<usize>,

    /// Comma-separated remote hosts ("local" runs on this machine).
    #[arg(long, value_name = "HOSTS", value_delimiter = ',')]
    pub hosts: Option<Vec<String>>,

    /// Producer/consumer pipeline with N consumers.
    #[arg(long, value_name = "N")]
    pub producer_consumer: Option<usize>,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Backend selection with "auto" sizes resolved and blank hosts dropped.
    #[must_use]
    pub fn backend_selection(&self) -> BackendSelection {
        let flags = &self.backend;
        BackendSelection {
            concurrent: flags.concurrent,
            thread_pool: flags.thread_pool.map(|n| if n == 0 { default_parallelism() } else { n }),
            processes: flags.processes,
            pool: flags.pool,
            hosts: flags.hosts.as_ref().map(|hosts| {
                hosts
                    .iter()
                    .map(|h| h.trim())
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            producer_consumer: flags.producer_consumer,
        }
    }

    /// Pipeline queue capacity, if one was given.
    #[must_use]
    pub fn queue_capacity(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let timeout =
        parse_duration(s).ok_or_else(|| format!("invalid duration {s:?} (try 60s, 500ms, 2m)"))?;
    if timeout.is_zero() {
        return Err("timeout must be positive".into());
    }
    Ok(timeout)
}

/// Parse a duration string like "2m", "1h", "30s", "500ms", or bare seconds.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        Some(Duration::from_millis(ms.parse().ok()?))
    } else if let Some(mins) = s.strip_suffix('m') {
        let n: u64 = mins.parse().ok()?;
        Some(Duration::from_secs(n.checked_mul(60)?))
    } else if let Some(hours) = s.strip_suffix('h') {
        let n: u64 = hours.parse().ok()?;
        Some(Duration::from_secs(n.checked_mul(3600)?))
    } else if let Some(secs) = s.strip_suffix('s') {
        Some(Duration::from_secs(secs.parse().ok()?))
    } else {
        Some(Duration::from_secs(s.parse().ok()?))
    }
}
