//! # Engine Configuration
//!
//! Per-call configuration for the structure-function engine: worker count,
//! zero-increment policy for negative orders and the summation method.
//! Nothing here is process-wide; every `compute` call receives its own
//! [`EngineConfig`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{StructureFunctionError, StructureFunctionResult};

/// Tunable constants for the engine.
pub mod constants {
    /// Increment count above which compensated summation is used by
    /// [`super::SummationMethod::Auto`].
    pub const DEFAULT_COMPENSATION_THRESHOLD: usize = 100_000;

    /// Minimum signal length accepted by `compute`.
    pub const MIN_SIGNAL_LENGTH: usize = 2;

    /// Minimum number of lags in a scaling regression.
    pub const MIN_REGRESSION_POINTS: usize = 3;
}

/// What to do with zero increments when accumulating a negative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ZeroIncrementPolicy {
    /// Fail the call with `NonPositiveIncrementForNegativeOrder` (default).
    #[default]
    Reject,
    /// Leave zero increments out of negative-order averages and report the
    /// excluded count per cell.
    Exclude,
}

/// Summation method used by the moment accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SummationMethod {
    /// Plain summation up to the compensation threshold, Neumaier above it.
    #[default]
    Auto,
    /// Always plain sequential summation.
    Naive,
    /// Always Kahan-Babuska-Neumaier compensated summation.
    Compensated,
}

/// Configuration for one `compute` call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Number of worker threads; 0 selects all available hardware threads.
    pub worker_count: usize,
    /// Handling of zero increments for negative orders
    pub zero_increment_policy: ZeroIncrementPolicy,
    /// Summation method for the moment sums
    pub summation: SummationMethod,
    /// Increment count above which `SummationMethod::Auto` compensates.
    pub compensation_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            zero_increment_policy: ZeroIncrementPolicy::Reject,
            summation: SummationMethod::Auto,
            compensation_threshold: constants::DEFAULT_COMPENSATION_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Default configuration with an explicit worker count.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Single worker, executed on the calling thread.
    pub fn single_threaded() -> Self {
        Self::with_workers(1)
    }

    /// Default configuration with zero increments excluded from negative orders.
    pub fn lenient() -> Self {
        Self {
            zero_increment_policy: ZeroIncrementPolicy::Exclude,
            ..Self::default()
        }
    }

    /// Set the zero-increment policy.
    pub fn zero_increment_policy(mut self, policy: ZeroIncrementPolicy) -> Self {
        self.zero_increment_policy = policy;
        self
    }

    /// Set the summation method.
    pub fn summation(mut self, method: SummationMethod) -> Self {
        self.summation = method;
        self
    }

    /// Set the compensation threshold used by [`SummationMethod::Auto`].
    pub fn compensation_threshold(mut self, threshold: usize) -> Self {
        self.compensation_threshold = threshold;
        self
    }

    /// Worker count after resolving 0 to the available hardware threads.
    ///
    /// Never returns less than 1.
    pub fn resolved_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        available_workers()
    }

    /// Whether a lag with `increment_count` terms is summed with compensation.
    pub fn uses_compensation(&self, increment_count: usize) -> bool {
        match self.summation {
            SummationMethod::Auto => increment_count > self.compensation_threshold,
            SummationMethod::Naive => false,
            SummationMethod::Compensated => true,
        }
    }

    /// Check the configuration for contradictory settings.
    pub fn validate(&self) -> StructureFunctionResult<()> {
        if self.summation == SummationMethod::Auto && self.compensation_threshold == 0 {
            return Err(StructureFunctionError::invalid(
                "compensation_threshold",
                "must be positive with SummationMethod::Auto; use SummationMethod::Compensated instead",
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "parallel")]
fn available_workers() -> usize {
    rayon::current_num_threads().max(1)
}

#[cfg(not(feature = "parallel"))]
fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
