//! CLI argument parsing for tickprof

use crate::config::{ClockKind, ProfilerConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for region reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// CSV table (default)
    Csv,
    /// JSON document for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "tickprof")]
#[command(version)]
#[command(about = "Calibrated region timers with percentile reports", long_about = None)]
pub struct Cli {
    /// Load profiler configuration from a TOML file
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Counter backing the timers (overrides the config file)
    #[arg(long = "clock", value_enum, global = true)]
    pub clock: Option<ClockKind>,

    /// Calibration reference sleep in milliseconds (overrides the config file)
    #[arg(long = "calibration-ms", value_name = "MS", global = true)]
    pub calibration_ms: Option<u64>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Calibrate the clock and print ticks per millisecond and read overhead
    Calibrate,

    /// Time a synthetic nested and recursive workload and print the report
    Demo {
        /// Outer iterations of the workload
        #[arg(short = 'n', long = "iterations", default_value = "200")]
        iterations: u32,

        /// Recursion depth of the recursive region
        #[arg(long = "depth", default_value = "12")]
        depth: u32,

        /// Report format
        #[arg(long = "format", value_enum, default_value = "csv")]
        format: OutputFormat,
    },
}

impl Cli {
    /// Resolve the effective configuration: file, then environment, then flags
    pub fn profiler_config(&self) -> anyhow::Result<ProfilerConfig> {
        let mut config = match &self.config {
            Some(path) => ProfilerConfig::from_toml(path)?,
            None => ProfilerConfig::default(),
        }
        .with_env_overrides();

        if let Some(clock) = self.clock {
            config.clock = clock;
        }
        if let Some(ms) = self.calibration_ms {
            config.calibration_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_calibrate() {
        let cli = Cli::parse_from(["tickprof", "calibrate"]);
        assert!(matches!(cli.command, Command::Calibrate));
        assert!(!cli.debug);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_demo_defaults() {
        let cli = Cli::parse_from(["tickprof", "demo"]);
        match cli.command {
            Command::Demo {
                iterations,
                depth,
                format,
            } => {
                assert_eq!(iterations, 200);
                assert_eq!(depth, 12);
                assert_eq!(format, OutputFormat::Csv);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_demo_custom() {
        let cli = Cli::parse_from([
            "tickprof", "demo", "-n", "5", "--depth", "3", "--format", "json",
        ]);
        match cli.command {
            Command::Demo {
                iterations,
                depth,
                format,
            } => {
                assert_eq!(iterations, 5);
                assert_eq!(depth, 3);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "tickprof",
            "calibrate",
            "--clock",
            "monotonic",
            "--calibration-ms",
            "5",
            "--debug",
        ]);
        assert_eq!(cli.clock, Some(ClockKind::Monotonic));
        assert_eq!(cli.calibration_ms, Some(5));
        assert!(cli.debug);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["tickprof"]).is_err());
    }

    #[test]
    fn test_profiler_config_flag_overrides() {
        let cli = Cli::parse_from([
            "tickprof",
            "calibrate",
            "--clock",
            "monotonic",
            "--calibration-ms",
            "7",
        ]);
        let config = cli.profiler_config().unwrap();
        assert_eq!(config.clock, ClockKind::Monotonic);
        assert_eq!(config.calibration_ms, 7);
    }

    #[test]
    fn test_profiler_config_rejects_zero_calibration() {
        let cli = Cli::parse_from(["tickprof", "calibrate", "--calibration-ms", "0"]);
        assert!(cli.profiler_config().is_err());
    }
}
