//! Name-keyed registry of region timers
//!
//! Regions are created lazily on their first `start`, live until
//! [`TimerRegistry::reset`], and are reported through
//! [`TimerRegistry::report`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tickprof::clock::{Calibration, ManualClock};
//! use tickprof::registry::TimerRegistry;
//!
//! let clock = Arc::new(ManualClock::new());
//! let registry = TimerRegistry::new(clock.clone(), Calibration::fixed(0, 1_000));
//!
//! {
//!     let _guard = registry.scope("load_config");
//!     clock.advance(2_500);
//! }
//!
//! let report = registry.report();
//! assert_eq!(report.row("load_config").unwrap().hits, 1);
//! assert_eq!(report.row("load_config").unwrap().avg_ms, 2.5);
//! ```

use crate::clock::{Calibration, ClockSource, TscClock};
use crate::error::Result;
use crate::region::RegionTimer;
use crate::report::{Report, ReportGenerator};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Reference to an open region, returned by [`TimerRegistry::start`]
///
/// Cloning a handle does not open the region again; ending both the
/// original and the clone is an unbalanced end. End a handle on the thread
/// that started it.
#[derive(Debug, Clone)]
pub struct RegionHandle {
    timer: Arc<RegionTimer>,
}

impl RegionHandle {
    pub fn name(&self) -> &str {
        self.timer.name()
    }
}

/// Thread-safe map from region name to [`RegionTimer`]
///
/// Lookups take a shared lock; only creating a region or resetting takes
/// the exclusive lock. Each region then serializes its own updates.
#[derive(Debug)]
pub struct TimerRegistry<C: ClockSource = TscClock> {
    clock: C,
    calibration: Calibration,
    regions: RwLock<HashMap<String, Arc<RegionTimer>>>,
}

impl<C: ClockSource> TimerRegistry<C> {
    /// Create an empty registry with an already known calibration
    pub fn new(clock: C, calibration: Calibration) -> Self {
        Self {
            clock,
            calibration,
            regions: RwLock::new(HashMap::new()),
        }
    }

    /// Calibrate `clock` against a wall-clock sleep, then create the registry
    pub fn calibrated(clock: C, reference: Duration, overhead_trials: u32) -> Result<Self> {
        let calibration = Calibration::measure(&clock, reference, overhead_trials)?;
        Ok(Self::new(clock, calibration))
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    fn read_regions(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<RegionTimer>>> {
        self.regions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_regions(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<RegionTimer>>> {
        self.regions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a region, creating it if this name has not been seen
    pub fn region(&self, name: &str) -> Arc<RegionTimer> {
        if let Some(timer) = self.read_regions().get(name) {
            return Arc::clone(timer);
        }

        let mut regions = self.write_regions();
        let timer = regions.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(region = name, "registering region");
            Arc::new(RegionTimer::new(name))
        });
        Arc::clone(timer)
    }

    /// Open `name`, or nest one level deeper if it is already open
    ///
    /// Prefer [`TimerRegistry::scope`], which cannot leak an open region.
    pub fn start(&self, name: &str) -> Result<RegionHandle> {
        let timer = self.region(name);
        timer.enter(|| self.clock.now())?;
        Ok(RegionHandle { timer })
    }

    /// Close one level of the region behind `handle`
    ///
    /// Closing the outermost level records a sample.
    ///
    /// # Errors
    ///
    /// [`crate::ProfilerError::UnbalancedEnd`] if the region is not open.
    /// The error is also logged as a warning.
    pub fn end(&self, handle: &RegionHandle) -> Result<()> {
        handle.timer.exit(|| self.clock.now()).map(|_| ())
    }

    /// Open `name` until the returned guard is dropped
    ///
    /// The region is closed on every exit path, including unwinding.
    pub fn scope(&self, name: &str) -> RegionGuard<'_, C> {
        RegionGuard {
            registry: self,
            handle: self.start(name).ok(),
        }
    }

    /// Time a closure as region `name`
    ///
    /// # Example
    /// ```
    /// use tickprof::clock::{Calibration, MonotonicClock};
    /// use tickprof::registry::TimerRegistry;
    ///
    /// let registry = TimerRegistry::new(MonotonicClock::new(), Calibration::fixed(0, 1_000_000));
    /// let result = registry.measure("format", || format!("test"));
    /// assert_eq!(result, "test");
    /// assert_eq!(registry.report().row("format").unwrap().hits, 1);
    /// ```
    pub fn measure<F, R>(&self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.scope(name);
        f()
    }

    /// Number of registered regions
    pub fn len(&self) -> usize {
        self.read_regions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_regions().is_empty()
    }

    /// Registered region names, sorted
    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_regions().keys().cloned().collect();
        names.sort();
        names
    }

    /// Aggregate the current samples of every region
    ///
    /// Read-only: repeated calls with no timing activity in between
    /// produce identical reports.
    pub fn report(&self) -> Report {
        let timers: Vec<Arc<RegionTimer>> = self.read_regions().values().cloned().collect();
        ReportGenerator::new(self.calibration).generate(&timers)
    }

    /// Report rendered as CSV
    pub fn report_csv(&self) -> String {
        self.report().to_csv()
    }

    /// Discard every region and its samples
    ///
    /// Handles and guards created before the reset keep pointing at their
    /// detached timers; ending them does not touch the new state.
    pub fn reset(&self) {
        let mut regions = self.write_regions();
        tracing::debug!(regions = regions.len(), "resetting timer registry");
        regions.clear();
    }
}

/// Scoped region acquisition; ends the region when dropped
#[must_use = "the region ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RegionGuard<'a, C: ClockSource = TscClock> {
    registry: &'a TimerRegistry<C>,
    handle: Option<RegionHandle>,
}

impl<C: ClockSource> RegionGuard<'_, C> {
    /// Name of the guarded region, if it was opened successfully
    pub fn name(&self) -> Option<&str> {
        self.handle.as_ref().map(RegionHandle::name)
    }

    /// End the region now and surface any contract violation
    pub fn finish(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.registry.end(&handle),
            None => Ok(()),
        }
    }
}

impl<C: ClockSource> Drop for RegionGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Already logged by `end`
            let _ = self.registry.end(&handle);
        }
    }
}
