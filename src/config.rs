//! Profiler configuration
//!
//! Controls which counter backs the timers and how the one-time calibration
//! runs. Loadable from TOML:
//!
//! ```toml
//! clock = "tsc"
//! calibration_ms = 200
//! overhead_trials = 1000
//! ```

use crate::clock::{Calibration, MonotonicClock, SystemClock, TscClock};
use crate::error::{ProfilerError, Result};
use crate::registry::TimerRegistry;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`ProfilerConfig::calibration_ms`]
pub const CALIBRATION_MS_ENV: &str = "TICKPROF_CALIBRATION_MS";

/// Counter used for timing
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    /// CPU time-stamp counter (falls back to monotonic off x86_64)
    #[default]
    Tsc,
    /// OS monotonic clock in nanoseconds
    Monotonic,
}

impl ClockKind {
    pub fn clock(self) -> SystemClock {
        match self {
            ClockKind::Tsc => SystemClock::Tsc(TscClock::new()),
            ClockKind::Monotonic => SystemClock::Monotonic(MonotonicClock::new()),
        }
    }
}

/// Configuration for clock selection and calibration
///
/// # Example
/// ```
/// use tickprof::config::ProfilerConfig;
///
/// let config = ProfilerConfig::default();
/// assert_eq!(config.calibration_ms, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilerConfig {
    /// Counter backing every timer
    pub clock: ClockKind,

    /// Wall-clock sleep used to relate ticks to milliseconds
    ///
    /// Longer references average out scheduler jitter at the cost of a
    /// slower startup. Default: 200ms
    pub calibration_ms: u64,

    /// Back-to-back counter reads used to estimate read overhead
    ///
    /// The minimum over all trials is kept. Default: 1000
    pub overhead_trials: u32,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            clock: ClockKind::Tsc,
            calibration_ms: 200,
            overhead_trials: 1000,
        }
    }
}

impl ProfilerConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse TOML profiler configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read profiler config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid profiler config: {}", path.as_ref().display()))
    }

    /// Apply overrides from the environment
    ///
    /// Unparseable values are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(CALIBRATION_MS_ENV) {
            match value.trim().parse::<u64>() {
                Ok(ms) => self.calibration_ms = ms,
                Err(e) => tracing::warn!(
                    variable = CALIBRATION_MS_ENV,
                    value = %value,
                    "ignoring invalid override: {}",
                    e
                ),
            }
        }
        self
    }

    /// Reject values that would make calibration meaningless
    pub fn validate(&self) -> Result<()> {
        if self.calibration_ms == 0 {
            return Err(ProfilerError::Config(
                "calibration_ms must be at least 1".to_string(),
            ));
        }
        if self.overhead_trials == 0 {
            return Err(ProfilerError::Config(
                "overhead_trials must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn calibration_reference(&self) -> Duration {
        Duration::from_millis(self.calibration_ms)
    }

    /// Calibrate the configured clock
    ///
    /// Blocks for `calibration_ms`.
    pub fn calibrate(&self) -> Result<(SystemClock, Calibration)> {
        self.validate()?;
        let clock = self.clock.clock();
        let calibration =
            Calibration::measure(&clock, self.calibration_reference(), self.overhead_trials)?;
        Ok((clock, calibration))
    }

    /// Calibrate the configured clock and create an empty registry on it
    pub fn build_registry(&self) -> Result<TimerRegistry<SystemClock>> {
        let (clock, calibration) = self.calibrate()?;
        Ok(TimerRegistry::new(clock, calibration))
    }
}
