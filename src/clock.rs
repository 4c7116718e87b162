//! Tick sources and wall-clock calibration
//!
//! A [`ClockSource`] is the raw counter read on every `start`/`end`. Ticks
//! are opaque until related to milliseconds by a [`Calibration`], which is
//! measured once by sleeping across a known wall-clock interval.
//!
//! # Example
//!
//! ```
//! use tickprof::clock::{Calibration, ClockSource, ManualClock};
//!
//! let clock = ManualClock::new();
//! let start = clock.now();
//! clock.advance(5_000);
//! let calibration = Calibration::fixed(0, 1_000);
//! assert_eq!(calibration.ticks_to_ms(clock.now() - start), 5.0);
//! ```

use crate::error::{ProfilerError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// A monotonic counter read on the timing hot path
///
/// Implementations must not allocate or block in [`ClockSource::now`].
pub trait ClockSource: Send + Sync {
    /// Read the counter
    fn now(&self) -> u64;
}

/// Nanoseconds since a process-wide epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

static EPOCH: OnceLock<Instant> = OnceLock::new();

impl MonotonicClock {
    pub fn new() -> Self {
        EPOCH.get_or_init(Instant::now);
        MonotonicClock
    }
}

impl ClockSource for MonotonicClock {
    #[inline]
    fn now(&self) -> u64 {
        EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

/// CPU time-stamp counter
///
/// Reads `rdtsc` on x86_64. Other architectures fall back to
/// [`MonotonicClock`] nanoseconds, which calibrate to ~1_000_000 ticks/ms.
#[derive(Debug, Clone, Copy, Default)]
pub struct TscClock {
    #[cfg(not(target_arch = "x86_64"))]
    fallback: MonotonicClock,
}

impl TscClock {
    pub fn new() -> Self {
        TscClock {
            #[cfg(not(target_arch = "x86_64"))]
            fallback: MonotonicClock::new(),
        }
    }
}

impl ClockSource for TscClock {
    #[inline]
    fn now(&self) -> u64 {
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: rdtsc is available on every x86_64 CPU and has no
            // memory side effects.
            unsafe { core::arch::x86_64::_rdtsc() }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            self.fallback.now()
        }
    }
}

/// Clock chosen at startup from configuration
#[derive(Debug, Clone, Copy)]
pub enum SystemClock {
    Tsc(TscClock),
    Monotonic(MonotonicClock),
}

impl ClockSource for SystemClock {
    #[inline]
    fn now(&self) -> u64 {
        match self {
            SystemClock::Tsc(clock) => clock.now(),
            SystemClock::Monotonic(clock) => clock.now(),
        }
    }
}

/// Counter that only moves when told to
///
/// Deterministic stand-in for a hardware counter in tests and examples.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Move the counter forward by `ticks`
    pub fn advance(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::SeqCst);
    }

    /// Jump the counter to an absolute value
    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    #[inline]
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl<C: ClockSource + ?Sized> ClockSource for std::sync::Arc<C> {
    #[inline]
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Cost in ticks of two back-to-back counter reads
///
/// Takes the minimum over `trials` attempts so a preemption in one attempt
/// does not inflate the result.
pub fn measure_overhead<C: ClockSource + ?Sized>(clock: &C, trials: u32) -> u64 {
    (0..trials.max(1))
        .map(|_| {
            let first = clock.now();
            let second = clock.now();
            second.saturating_sub(first)
        })
        .min()
        .unwrap_or(0)
}

/// Relationship between counter ticks and wall-clock milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Ticks consumed by the counter reads surrounding every interval
    pub overhead_ticks: u64,
    /// Counter ticks per wall-clock millisecond (never zero)
    pub ticks_per_ms: u64,
}

impl Calibration {
    /// Use known constants instead of measuring
    pub fn fixed(overhead_ticks: u64, ticks_per_ms: u64) -> Self {
        Self {
            overhead_ticks,
            ticks_per_ms: ticks_per_ms.max(1),
        }
    }

    /// Measure overhead and tick rate against a wall-clock sleep
    ///
    /// Blocks the calling thread for `reference`. Scheduler jitter during
    /// the sleep shows up as calibration error; the result is a coarse
    /// linear approximation.
    ///
    /// # Errors
    ///
    /// Returns [`ProfilerError::InvalidReferenceDuration`] if `reference`
    /// is shorter than one millisecond.
    pub fn measure<C: ClockSource + ?Sized>(
        clock: &C,
        reference: Duration,
        overhead_trials: u32,
    ) -> Result<Self> {
        let reference_ms = reference.as_millis() as u64;
        if reference_ms == 0 {
            return Err(ProfilerError::InvalidReferenceDuration(reference));
        }

        let overhead_ticks = measure_overhead(clock, overhead_trials);

        let start = clock.now();
        std::thread::sleep(reference);
        let elapsed = clock
            .now()
            .saturating_sub(start)
            .saturating_sub(overhead_ticks);

        let calibration = Self::fixed(overhead_ticks, elapsed / reference_ms);
        tracing::info!(
            ticks_per_ms = calibration.ticks_per_ms,
            overhead_ticks = calibration.overhead_ticks,
            "timer calibration complete"
        );
        Ok(calibration)
    }

    /// Convert a tick count to milliseconds
    #[inline]
    pub fn ticks_to_ms(&self, ticks: u64) -> f64 {
        ticks as f64 / self.ticks_per_ms as f64
    }

    /// Remove the per-interval counter overhead from a raw sample
    #[inline]
    pub fn net_ticks(&self, raw: u64) -> u64 {
        raw.saturating_sub(self.overhead_ticks)
    }
}
