//! CLI output formatting.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use pireduce_core::SegmentFailure;
use pireduce_orchestration::{RunReport, SeriesSummary};

/// The one-line run summary: `π≈<estimate> error=<error> time=<secs>s`.
///
/// # Example
/// ```
/// use pireduce_cli::output::summary_line;
/// use std::time::Duration;
///
/// let line = summary_line(3.1415916535897743, 1.0e-6, Duration::from_millis(1234));
/// assert_eq!(line, "π≈3.141591653590 error=1.000e-6 time=1.234s");
/// ```
#[must_use]
pub fn summary_line(estimate: f64, error: f64, elapsed: Duration) -> String {
    format!(
        "π≈{} error={} time={}s",
        format_estimate(estimate),
        format_error(error),
        format_elapsed(elapsed)
    )
}

/// Estimate with twelve decimals.
#[must_use]
pub fn format_estimate(estimate: f64) -> String {
    format!("{estimate:.12}")
}

/// Error in scientific notation.
#[must_use]
pub fn format_error(error: f64) -> String {
    format!("{error:.3e}")
}

/// Elapsed seconds with millisecond precision.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64())
}

/// Format a duration for display.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.001 {
        format!("{:.2}µs", secs * 1_000_000.0)
    } else if secs < 1.0 {
        format!("{:.2}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.3}s")
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins as f64 * 60.0);
        format!("{mins}m{remaining:.1}s")
    }
}

/// Format a number with thousand separators.
#[must_use]
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// One line describing a lost segment.
#[must_use]
pub fn format_failure(failure: &SegmentFailure) -> String {
    match &failure.endpoint {
        Some(endpoint) => format!(
            "segment {} {} on {endpoint}: {}",
            failure.index, failure.segment, failure.reason
        ),
        None => format!(
            "segment {} {}: {}",
            failure.index, failure.segment, failure.reason
        ),
    }
}

/// Detail lines shown in verbose mode.
#[must_use]
pub fn report_details(report: &RunReport) -> Vec<String> {
    vec![
        format!("Backend: {}", report.backend),
        format!("Terms: {}", format_number(report.total)),
        format!(
            "Segments: {} of {} terms",
            format_number(report.segments as u64),
            format_number(report.segment_size)
        ),
        format!("Aggregate: {}", report.aggregate),
        format!("Duration: {}", format_duration(report.elapsed)),
    ]
}

/// Statistics block for one series, twelve decimals per value.
#[must_use]
pub fn summary_block(label: &str, summary: &SeriesSummary) -> String {
    format!(
        "Statistics for {label}:\n  mean: {:.12}\n  std dev: {:.12}\n  min: {:.12}\n  max: {:.12}",
        summary.mean, summary.std_dev, summary.min, summary.max
    )
}

/// Write any serializable report as pretty JSON.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be created or written.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    debug!(path = %path.display(), "report written");
    Ok(())
}
