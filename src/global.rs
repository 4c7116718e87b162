//! Process-wide registry and free-function API
//!
//! The global registry is calibrated exactly once: either explicitly with
//! [`init`], or lazily from [`ProfilerConfig::default`] plus environment
//! overrides on the first call to [`registry`]. Code that can take a
//! registry by reference should do so instead; these functions exist for
//! call sites far from any shared state.
//!
//! # Example
//!
//! ```no_run
//! fn apply_step() {
//!     tickprof::profile_scope!("solver::apply_step");
//!     // ... work ...
//! }
//!
//! apply_step();
//! print!("{}", tickprof::global::report());
//! ```

use crate::clock::{Calibration, SystemClock};
use crate::config::ProfilerConfig;
use crate::error::Result;
use crate::registry::{RegionGuard, RegionHandle, TimerRegistry};
use std::sync::OnceLock;

/// Registry type used process-wide
pub type GlobalRegistry = TimerRegistry<SystemClock>;

static REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

/// Calibrate and install the process-wide registry
///
/// Returns the existing registry unchanged if one is already installed.
/// Blocks for `config.calibration_ms` otherwise.
pub fn init(config: &ProfilerConfig) -> Result<&'static GlobalRegistry> {
    if let Some(registry) = REGISTRY.get() {
        tracing::debug!("global timer registry already initialized");
        return Ok(registry);
    }
    let registry = config.build_registry()?;
    Ok(REGISTRY.get_or_init(|| registry))
}

/// Whether the process-wide registry has been installed
pub fn is_initialized() -> bool {
    REGISTRY.get().is_some()
}

/// The process-wide registry, calibrating it on first use
pub fn registry() -> &'static GlobalRegistry {
    REGISTRY.get_or_init(|| {
        let mut config = ProfilerConfig::default().with_env_overrides();
        if let Err(e) = config.validate() {
            tracing::warn!("falling back to default profiler config: {}", e);
            config = ProfilerConfig::default();
        }
        let clock = config.clock.clock();
        let calibration =
            Calibration::measure(&clock, config.calibration_reference(), config.overhead_trials)
                .unwrap_or_else(|e| {
                    tracing::warn!("timer calibration failed, reporting raw ticks: {}", e);
                    Calibration::fixed(0, 1)
                });
        TimerRegistry::new(clock, calibration)
    })
}

/// Open region `name` on the global registry
pub fn start(name: &str) -> Result<RegionHandle> {
    registry().start(name)
}

/// Close one level of the region behind `handle`
pub fn end(handle: &RegionHandle) -> Result<()> {
    registry().end(handle)
}

/// Open region `name` until the guard is dropped
pub fn scope(name: &str) -> RegionGuard<'static, SystemClock> {
    registry().scope(name)
}

/// Time a closure as region `name`
pub fn measure<F, R>(name: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    registry().measure(name, f)
}

/// CSV report of every region timed so far
pub fn report() -> String {
    registry().report_csv()
}

/// JSON report of every region timed so far
pub fn report_json() -> anyhow::Result<String> {
    registry().report().to_json()
}

/// Discard all global timing state
pub fn reset() {
    registry().reset();
}

/// Time the rest of the enclosing block as a named region
///
/// Without a registry argument the process-wide registry is used.
///
/// ```
/// use std::sync::Arc;
/// use tickprof::clock::{Calibration, ManualClock};
/// use tickprof::registry::TimerRegistry;
///
/// let clock = Arc::new(ManualClock::new());
/// let registry = TimerRegistry::new(clock.clone(), Calibration::fixed(0, 1));
/// {
///     tickprof::profile_scope!(registry, "block");
///     clock.advance(3);
/// }
/// assert_eq!(registry.report().row("block").unwrap().hits, 1);
/// ```
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        let _tickprof_guard = $crate::global::scope($name);
    };
    ($registry:expr, $name:expr) => {
        let _tickprof_guard = ($registry).scope($name);
    };
}
