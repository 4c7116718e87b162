//! Error types for region timing and calibration
//!
//! Contract violations (an `end` without a matching `start`, runaway nesting)
//! are reported as values and logged, never raised as panics: a profiler
//! must not take down the program it is measuring.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while timing regions or calibrating the clock
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("region '{region}' ended without a matching start")]
    UnbalancedEnd { region: String },

    #[error("region '{region}' exceeded the maximum nesting depth")]
    DepthOverflow { region: String },

    #[error("calibration reference must be at least 1ms, got {0:?}")]
    InvalidReferenceDuration(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for profiler operations
pub type Result<T> = std::result::Result<T, ProfilerError>;

impl ProfilerError {
    /// Whether this error is a caller contract violation (unbalanced
    /// start/end usage) rather than a setup problem
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ProfilerError::UnbalancedEnd { .. } | ProfilerError::DepthOverflow { .. }
        )
    }
}
