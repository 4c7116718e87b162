//! Per-region interval state machine
//!
//! On each thread a region is either closed or open with some nesting depth.
//! Only the outermost `enter`/`exit` pair on a thread produces a sample;
//! inner pairs with the same name are absorbed into the running outer
//! interval, so time spent in a recursive self-call is counted once, inside
//! its caller. Calls on different threads never nest into each other.

use crate::error::{ProfilerError, Result};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// Open/closed state of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionState {
    #[default]
    Closed,
    Open {
        /// Currently unmatched `enter` calls
        depth: NonZeroU32,
        /// Counter value at the outermost `enter`
        started_at: u64,
    },
}

impl RegionState {
    /// Number of unmatched `enter` calls
    pub fn depth(&self) -> u32 {
        match self {
            RegionState::Closed => 0,
            RegionState::Open { depth, .. } => depth.get(),
        }
    }
}

#[derive(Debug, Default)]
struct RegionInner {
    /// Open state per thread; a missing entry means closed
    open: HashMap<ThreadId, RegionState>,
    samples: Vec<u64>,
}

impl RegionInner {
    fn state_of(&self, thread: ThreadId) -> RegionState {
        self.open.get(&thread).copied().unwrap_or_default()
    }

    fn set_state(&mut self, thread: ThreadId, state: RegionState) {
        match state {
            RegionState::Closed => {
                self.open.remove(&thread);
            }
            open => {
                self.open.insert(thread, open);
            }
        }
    }
}

/// Accumulated samples and open state for one named region
///
/// All mutation goes through a per-region mutex, so a timer may be shared
/// between threads. Nesting is tracked per thread: two threads inside the
/// same region at once each record their own interval. A region must be
/// exited on the thread that entered it.
#[derive(Debug)]
pub struct RegionTimer {
    name: String,
    inner: Mutex<RegionInner>,
}

impl RegionTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(RegionInner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, RegionInner> {
        // A panic while holding the lock cannot leave the state torn: every
        // mutation below is a single assignment or push.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the region, or nest one level deeper if already open
    ///
    /// `now` is read only on the closed-to-open transition.
    pub fn enter(&self, now: impl FnOnce() -> u64) -> Result<()> {
        let thread = thread::current().id();
        let mut inner = self.lock();
        let next = match inner.state_of(thread) {
            RegionState::Closed => RegionState::Open {
                depth: NonZeroU32::MIN,
                started_at: now(),
            },
            RegionState::Open { depth, started_at } => {
                let depth = depth.checked_add(1).ok_or_else(|| {
                    let err = ProfilerError::DepthOverflow {
                        region: self.name.clone(),
                    };
                    tracing::warn!(region = %self.name, "{}", err);
                    err
                })?;
                RegionState::Open { depth, started_at }
            }
        };
        inner.set_state(thread, next);
        Ok(())
    }

    /// Close one nesting level
    ///
    /// Returns the recorded sample when this closes the outermost level,
    /// `None` when an inner level closes.
    ///
    /// # Errors
    ///
    /// [`ProfilerError::UnbalancedEnd`] if the region is not open on the
    /// calling thread. The state is left unchanged.
    pub fn exit(&self, now: impl FnOnce() -> u64) -> Result<Option<u64>> {
        let thread = thread::current().id();
        let mut inner = self.lock();
        match inner.state_of(thread) {
            RegionState::Closed => {
                let err = ProfilerError::UnbalancedEnd {
                    region: self.name.clone(),
                };
                tracing::warn!(region = %self.name, "{}", err);
                Err(err)
            }
            RegionState::Open { depth, started_at } => match NonZeroU32::new(depth.get() - 1) {
                Some(depth) => {
                    inner.set_state(thread, RegionState::Open { depth, started_at });
                    Ok(None)
                }
                None => {
                    let sample = now().saturating_sub(started_at);
                    inner.set_state(thread, RegionState::Closed);
                    inner.samples.push(sample);
                    Ok(Some(sample))
                }
            },
        }
    }

    /// Open/closed state on the calling thread
    pub fn state(&self) -> RegionState {
        self.lock().state_of(thread::current().id())
    }

    /// Number of threads that currently have this region open
    pub fn open_threads(&self) -> usize {
        self.lock().open.len()
    }

    /// Number of completed outermost intervals
    pub fn hits(&self) -> usize {
        self.lock().samples.len()
    }

    /// Copy of the recorded raw samples, in recording order
    pub fn samples(&self) -> Vec<u64> {
        self.lock().samples.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_region_is_closed_and_empty() {
        let timer = RegionTimer::new("parse");
        assert_eq!(timer.name(), "parse");
        assert_eq!(timer.state(), RegionState::Closed);
        assert_eq!(timer.state().depth(), 0);
        assert_eq!(timer.hits(), 0);
    }

    #[test]
    fn test_single_interval() {
        let timer = RegionTimer::new("parse");
        timer.enter(|| 100).unwrap();
        assert_eq!(timer.state().depth(), 1);
        assert_eq!(timer.exit(|| 175).unwrap(), Some(75));
        assert_eq!(timer.state(), RegionState::Closed);
        assert_eq!(timer.samples(), vec![75]);
    }

    #[test]
    fn test_recursion_is_absorbed_into_outer_interval() {
        let timer = RegionTimer::new("fib");
        timer.enter(|| 10).unwrap();
        timer.enter(|| panic!("inner enter must not read the clock")).unwrap();
        timer.enter(|| panic!("inner enter must not read the clock")).unwrap();
        assert_eq!(timer.state().depth(), 3);

        assert_eq!(timer.exit(|| panic!("inner exit must not read the clock")).unwrap(), None);
        assert_eq!(timer.exit(|| panic!("inner exit must not read the clock")).unwrap(), None);
        assert_eq!(timer.exit(|| 50).unwrap(), Some(40));
        assert_eq!(timer.samples(), vec![40]);
    }

    #[test]
    fn test_exit_on_closed_region_is_reported() {
        let timer = RegionTimer::new("io");
        let err = timer.exit(|| 0).unwrap_err();
        assert_eq!(
            err,
            ProfilerError::UnbalancedEnd {
                region: "io".to_string()
            }
        );
        assert_eq!(timer.state(), RegionState::Closed);
        assert_eq!(timer.hits(), 0);
    }

    #[test]
    fn test_extra_exit_after_balanced_pair_does_not_corrupt_state() {
        let timer = RegionTimer::new("io");
        timer.enter(|| 0).unwrap();
        timer.exit(|| 5).unwrap();
        assert!(timer.exit(|| 9).is_err());

        timer.enter(|| 20).unwrap();
        timer.exit(|| 27).unwrap();
        assert_eq!(timer.samples(), vec![5, 7]);
    }

    #[test]
    fn test_clock_wrap_saturates_to_zero() {
        let timer = RegionTimer::new("wrap");
        timer.enter(|| 500).unwrap();
        assert_eq!(timer.exit(|| 100).unwrap(), Some(0));
    }

    #[test]
    fn test_depth_overflow_is_reported() {
        let timer = RegionTimer::new("deep");
        timer.lock().set_state(
            thread::current().id(),
            RegionState::Open {
                depth: NonZeroU32::MAX,
                started_at: 0,
            },
        );
        let err = timer.enter(|| 0).unwrap_err();
        assert_eq!(
            err,
            ProfilerError::DepthOverflow {
                region: "deep".to_string()
            }
        );
        assert_eq!(timer.state().depth(), u32::MAX);
    }

    #[test]
    fn test_overlapping_threads_record_separate_intervals() {
        use std::sync::Barrier;

        let timer = RegionTimer::new("work");
        let barrier = Barrier::new(2);

        // Thread A: 0..10, thread B: 5..100
        thread::scope(|s| {
            s.spawn(|| {
                timer.enter(|| 0).unwrap();
                barrier.wait();
                barrier.wait();
                assert_eq!(timer.exit(|| 10).unwrap(), Some(10));
                barrier.wait();
            });
            s.spawn(|| {
                barrier.wait();
                timer.enter(|| 5).unwrap();
                assert_eq!(timer.state().depth(), 1);
                barrier.wait();
                barrier.wait();
                assert_eq!(timer.exit(|| 100).unwrap(), Some(95));
            });
        });

        let mut samples = timer.samples();
        samples.sort_unstable();
        assert_eq!(samples, vec![10, 95]);
        assert_eq!(timer.open_threads(), 0);
    }

    #[test]
    fn test_exit_on_other_thread_is_unbalanced() {
        let timer = RegionTimer::new("io");
        timer.enter(|| 0).unwrap();
        thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(timer.state(), RegionState::Closed);
                assert!(timer.exit(|| 3).is_err());
            });
        });
        assert_eq!(timer.state().depth(), 1);
        assert_eq!(timer.exit(|| 4).unwrap(), Some(4));
    }
}
