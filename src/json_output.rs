//! JSON output format for region reports

use crate::report::Report;
use serde::{Deserialize, Serialize};

/// Calibration constants the millisecond figures were derived from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonCalibration {
    pub ticks_per_ms: u64,
    pub overhead_ticks: u64,
}

/// A single region row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRegion {
    /// Region name (e.g., "solver::apply")
    pub name: String,
    /// Total ticks with counter overhead removed
    pub total_ticks: u64,
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub hits: usize,
}

/// Totals across all regions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub total_regions: usize,
    pub total_hits: usize,
}

/// Complete JSON report document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    /// Crate version that produced the report
    pub version: String,
    pub format: String,
    pub calibration: JsonCalibration,
    /// Regions, costliest first
    pub regions: Vec<JsonRegion>,
    pub summary: JsonSummary,
}

impl JsonReport {
    pub fn from_report(report: &Report) -> Self {
        let regions: Vec<JsonRegion> = report
            .rows
            .iter()
            .map(|row| JsonRegion {
                name: row.name.clone(),
                total_ticks: row.total_ticks,
                avg_ms: row.avg_ms,
                p95_ms: row.p95_ms,
                p99_ms: row.p99_ms,
                hits: row.hits,
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "tickprof-json-v1".to_string(),
            calibration: JsonCalibration {
                ticks_per_ms: report.calibration.ticks_per_ms,
                overhead_ticks: report.calibration.overhead_ticks,
            },
            summary: JsonSummary {
                total_regions: regions.len(),
                total_hits: regions.iter().map(|region| region.hits).sum(),
            },
            regions,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Calibration;
    use crate::report::RegionStats;

    fn sample_report() -> Report {
        Report {
            calibration: Calibration::fixed(24, 3_000_000),
            rows: vec![
                RegionStats {
                    name: "solve".to_string(),
                    total_ticks: 9_000_000,
                    avg_ms: 1.5,
                    p95_ms: 2.0,
                    p99_ms: 2.5,
                    hits: 2,
                },
                RegionStats {
                    name: "idle".to_string(),
                    total_ticks: 0,
                    avg_ms: 0.0,
                    p95_ms: 0.0,
                    p99_ms: 0.0,
                    hits: 0,
                },
            ],
        }
    }

    #[test]
    fn test_json_report_creation() {
        let output = JsonReport::from_report(&sample_report());
        assert_eq!(output.format, "tickprof-json-v1");
        assert_eq!(output.regions.len(), 2);
        assert_eq!(output.summary.total_regions, 2);
        assert_eq!(output.summary.total_hits, 2);
        assert_eq!(output.calibration.ticks_per_ms, 3_000_000);
    }

    #[test]
    fn test_json_serialization_keeps_order() {
        let json = JsonReport::from_report(&sample_report()).to_json().unwrap();
        assert!(json.contains("\"format\": \"tickprof-json-v1\""));
        assert!(json.contains("\"overhead_ticks\": 24"));

        let solve = json.find("\"solve\"").unwrap();
        let idle = json.find("\"idle\"").unwrap();
        assert!(solve < idle);
    }

    #[test]
    fn test_json_parses_back() {
        let json = sample_report().to_json().unwrap();
        let parsed: JsonReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.regions[0].name, "solve");
        assert_eq!(parsed.regions[0].p99_ms, 2.5);
        assert_eq!(parsed.regions[1].hits, 0);
    }
}
