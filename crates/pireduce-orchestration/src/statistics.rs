//! Summary statistics over repeated runs.

use serde::Serialize;

use crate::interfaces::RunReport;

/// Mean, population standard deviation, minimum and maximum of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesSummary {
    /// Summarise `samples`; `None` when there are none.
    ///
    /// # Example
    /// ```
    /// use pireduce_orchestration::statistics::SeriesSummary;
    ///
    /// let s = SeriesSummary::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
    /// assert_eq!(s.mean, 5.0);
    /// assert_eq!(s.std_dev, 2.0);
    /// assert_eq!((s.min, s.max), (2.0, 9.0));
    /// assert!(SeriesSummary::from_samples(&[]).is_none());
    /// ```
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }
}

/// Statistics of estimate, error and elapsed time across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub runs: usize,
    pub estimate: SeriesSummary,
    pub error: SeriesSummary,
    pub elapsed_secs: SeriesSummary,
    /// Individual runs, in execution order.
    pub reports: Vec<RunReport>,
}

impl RunStatistics {
    /// Summarise `reports`; `None` when there are none.
    #[must_use]
    pub fn from_reports(reports: Vec<RunReport>) -> Option<Self> {
        let estimate = SeriesSummary::from_samples(&column(&reports, |r| r.estimate))?;
        let error = SeriesSummary::from_samples(&column(&reports, |r| r.error))?;
        let elapsed_secs =
            SeriesSummary::from_samples(&column(&reports, |r| r.elapsed.as_secs_f64()))?;
        Some(Self {
            runs: reports.len(),
            estimate,
            error,
            elapsed_secs,
            reports,
        })
    }

    /// Total number of failed segments across all runs.
    #[must_use]
    pub fn failed_segments(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }
}

fn column(reports: &[RunReport], field: impl Fn(&RunReport) -> f64) -> Vec<f64> {
    reports.iter().map(field).collect()
}
