//! CLI result presenter.

use pireduce_orchestration::{ResultPresenter, RunReport, RunStatistics};

use crate::output::{
    format_estimate, format_failure, format_number, report_details, summary_block, summary_line,
};
use crate::ui::{print_error, print_header, print_warning};

/// CLI result presenter. Results go to stdout, diagnostics to stderr.
pub struct CLIResultPresenter {
    verbose: bool,
    quiet: bool,
}

impl CLIResultPresenter {
    #[must_use]
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Lines written to stdout for one report.
    #[must_use]
    pub fn report_lines(&self, report: &RunReport) -> Vec<String> {
        if self.quiet {
            return vec![format_estimate(report.estimate)];
        }
        let mut lines = Vec::new();
        if self.verbose {
            lines.extend(report_details(report));
        }
        lines.push(summary_line(report.estimate, report.error, report.elapsed));
        lines
    }
}

impl ResultPresenter for CLIResultPresenter {
    fn present_report(&self, report: &RunReport) {
        for failure in &report.failures {
            print_warning(&format_failure(failure));
        }
        if !report.failures.is_empty() && !self.quiet {
            print_warning(&format!(
                "{} of {} segments missing from the aggregate",
                report.failures.len(),
                report.segments
            ));
        }
        for line in self.report_lines(report) {
            println!("{line}");
        }
    }

    fn present_statistics(&self, stats: &RunStatistics) {
        if self.quiet {
            println!("{}", format_estimate(stats.estimate.mean));
            return;
        }

        for (i, report) in stats.reports.iter().enumerate() {
            println!(
                "Run {}: {}",
                i + 1,
                summary_line(report.estimate, report.error, report.elapsed)
            );
        }
        print_header(&format!("{} runs", format_number(stats.runs as u64)));
        println!("{}", summary_block("estimate", &stats.estimate));
        println!("{}", summary_block("error", &stats.error));
        println!("{}", summary_block("elapsed seconds", &stats.elapsed_secs));

        let failed = stats.failed_segments();
        if failed > 0 {
            print_warning(&format!("{failed} segments failed across all runs"));
        }
    }

    fn present_error(&self, error: &str) {
        print_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pireduce_core::{Segment, SegmentFailure};
    use std::time::Duration;

    fn report() -> RunReport {
        RunReport {
            backend: "remote".into(),
            total: 1000,
            segment_size: 100,
            segments: 10,
            aggregate: 0.7848981638974463,
            estimate: 3.139592655589785,
            error: 0.0019999999999,
            elapsed: Duration::from_millis(250),
            failures: Vec::new(),
        }
    }

    #[test]
    fn quiet_prints_only_estimate() {
        let presenter = CLIResultPresenter::new(false, true);
        assert_eq!(presenter.report_lines(&report()), ["3.139592655590"]);
    }

    #[test]
    fn normal_prints_summary_line() {
        let presenter = CLIResultPresenter::new(false, false);
        let lines = presenter.report_lines(&report());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("π≈3.139592655590 error=2.000e-3 time=0.250s"));
    }

    #[test]
    fn verbose_adds_details() {
        let presenter = CLIResultPresenter::new(true, false);
        let lines = presenter.report_lines(&report());
        assert!(lines.iter().any(|l| l == "Backend: remote"));
        assert!(lines.last().unwrap().starts_with("π≈"));
    }

    #[test]
    fn present_with_failures_does_not_panic() {
        let mut report = report();
        report.failures.push(SegmentFailure {
            index: 1,
            segment: Segment::new(100, 100),
            endpoint: Some("down".into()),
            reason: "transport error: refused".into(),
        });
        CLIResultPresenter::new(false, false).present_report(&report);
        CLIResultPresenter::new(false, true).present_report(&report);
    }

    #[test]
    fn present_statistics_does_not_panic() {
        let stats = RunStatistics::from_reports(vec![report(), report()]).unwrap();
        CLIResultPresenter::new(false, false).present_statistics(&stats);
        CLIResultPresenter::new(false, true).present_statistics(&stats);
    }

    #[test]
    fn present_error_does_not_panic() {
        CLIResultPresenter::new(false, false).present_error("no backend selected");
    }
}
