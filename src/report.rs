//! Ranked per-region statistics
//!
//! Percentiles are rank-based, not interpolated: a region's samples are
//! sorted largest first and the p95/p99 values are read at fixed positions
//! counted from the slow end. With `hits` samples the positions are
//!
//! ```text
//! idx95 = max(1, floor(0.05 * hits))
//! idx99 = max(1, floor(0.01 * hits))
//! ```
//!
//! clamped to the last sample, so a region with a single sample reports that
//! sample for both percentiles. Rows are ranked by total cost, costliest
//! first, with ties ordered by name.

use crate::clock::Calibration;
use crate::csv_output::CsvReportOutput;
use crate::json_output::JsonReport;
use crate::region::RegionTimer;
use std::sync::Arc;

/// Fraction of samples above the 95th percentile
pub const P95_TAIL: f64 = 0.05;
/// Fraction of samples above the 99th percentile
pub const P99_TAIL: f64 = 0.01;

/// Position of a percentile in a descending-sorted sample list
///
/// `tail` is the fraction of samples expected above the percentile. Never
/// returns 0, so the single largest sample is never reported as a percentile
/// when more than one sample exists.
pub fn percentile_index(hits: usize, tail: f64) -> usize {
    ((tail * hits as f64) as usize).max(1)
}

/// Aggregated statistics for one region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStats {
    pub name: String,
    /// Sum of all samples, overhead removed
    pub total_ticks: u64,
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// Completed outermost intervals
    pub hits: usize,
}

/// A ranked snapshot of every region
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub calibration: Calibration,
    pub rows: Vec<RegionStats>,
}

impl Report {
    /// Find the row for `name`
    pub fn row(&self, name: &str) -> Option<&RegionStats> {
        self.rows.iter().find(|row| row.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as CSV (`name,avg milliseconds,perc95,perc99,hits`)
    pub fn to_csv(&self) -> String {
        let mut output = CsvReportOutput::new();
        for row in &self.rows {
            output.add_row(row);
        }
        output.to_csv()
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        JsonReport::from_report(self).to_json()
    }
}

/// Turns raw region samples into a [`Report`]
#[derive(Debug, Clone, Copy)]
pub struct ReportGenerator {
    calibration: Calibration,
}

impl ReportGenerator {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    /// Build the report for `timers`
    ///
    /// Regions without a completed interval are kept, with zero hits and
    /// zero durations.
    pub fn generate(&self, timers: &[Arc<RegionTimer>]) -> Report {
        let mut rows: Vec<RegionStats> = timers
            .iter()
            .map(|timer| self.region_stats(timer.name(), timer.samples()))
            .collect();

        rows.sort_by(|a, b| {
            b.total_ticks
                .cmp(&a.total_ticks)
                .then_with(|| a.name.cmp(&b.name))
        });

        Report {
            calibration: self.calibration,
            rows,
        }
    }

    /// Statistics for one region from its raw samples
    pub fn region_stats(&self, name: &str, mut samples: Vec<u64>) -> RegionStats {
        samples.sort_unstable_by(|a, b| b.cmp(a));

        let hits = samples.len();
        let total_ticks = samples.iter().fold(0u64, |total, &sample| {
            total.saturating_add(self.calibration.net_ticks(sample))
        });

        let percentile = |tail: f64| -> u64 {
            if hits == 0 {
                return 0;
            }
            let index = percentile_index(hits, tail).min(hits - 1);
            self.calibration.net_ticks(samples[index])
        };
        let p95_ticks = percentile(P95_TAIL);
        let p99_ticks = percentile(P99_TAIL);

        RegionStats {
            name: name.to_string(),
            total_ticks,
            avg_ms: self.calibration.ticks_to_ms(total_ticks) / hits.max(1) as f64,
            p95_ms: self.calibration.ticks_to_ms(p95_ticks),
            p99_ms: self.calibration.ticks_to_ms(p99_ticks),
            hits,
        }
    }
}
