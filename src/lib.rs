//! tickprof - Low-overhead in-process region timers
//!
//! Mark the start and end of named code regions; elapsed counter ticks are
//! collected per region and turned into a ranked report of average,
//! 95th/99th percentile and hit count, calibrated to milliseconds.
//!
//! ```
//! use std::sync::Arc;
//! use tickprof::{Calibration, ManualClock, TimerRegistry};
//!
//! let clock = Arc::new(ManualClock::new());
//! let registry = TimerRegistry::new(clock.clone(), Calibration::fixed(0, 1_000));
//!
//! let handle = registry.start("decode").unwrap();
//! clock.advance(1_500);
//! registry.end(&handle).unwrap();
//!
//! assert_eq!(
//!     registry.report_csv(),
//!     "name,avg milliseconds,perc95,perc99,hits\ndecode,1.50,1.50,1.50,1\n"
//! );
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod csv_output;
pub mod error;
pub mod global;
pub mod json_output;
pub mod region;
pub mod registry;
pub mod report;

pub use clock::{Calibration, ClockSource, ManualClock, MonotonicClock, SystemClock, TscClock};
pub use config::{ClockKind, ProfilerConfig};
pub use error::ProfilerError;
pub use registry::{RegionGuard, RegionHandle, TimerRegistry};
pub use report::{RegionStats, Report, ReportGenerator};
