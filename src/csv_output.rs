//! CSV output format for region reports
//!
//! One header row followed by one row per region, durations in milliseconds
//! with two decimals:
//!
//! ```text
//! name,avg milliseconds,perc95,perc99,hits
//! decode,1.25,3.10,4.02,812
//! ```

use crate::report::RegionStats;

/// Header row of every region report
pub const REPORT_HEADER: &str = "name,avg milliseconds,perc95,perc99,hits";

/// CSV record for a single region
#[derive(Debug, Clone)]
pub struct CsvRegionRow {
    pub name: String,
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub hits: usize,
}

impl From<&RegionStats> for CsvRegionRow {
    fn from(stats: &RegionStats) -> Self {
        Self {
            name: stats.name.clone(),
            avg_ms: stats.avg_ms,
            p95_ms: stats.p95_ms,
            p99_ms: stats.p99_ms,
            hits: stats.hits,
        }
    }
}

/// CSV report formatter
///
/// Rows are written in the order they were added.
#[derive(Debug, Default)]
pub struct CsvReportOutput {
    rows: Vec<CsvRegionRow>,
}

impl CsvReportOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region row to the output
    pub fn add_row(&mut self, stats: &RegionStats) {
        self.rows.push(CsvRegionRow::from(stats));
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_row(row: &CsvRegionRow) -> String {
        format!(
            "{},{:.2},{:.2},{:.2},{}",
            Self::escape_field(&row.name),
            row.avg_ms,
            row.p95_ms,
            row.p99_ms,
            row.hits
        )
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(REPORT_HEADER);
        output.push('\n');

        for row in &self.rows {
            output.push_str(&Self::format_row(row));
            output.push('\n');
        }

        output
    }
}
