//! Absolute-increment accumulation for a single lag.
//!
//! For lag τ the increments a_t = |x(t + τ) - x(t)|, t = 0..N-τ-1, are produced
//! in one linear pass and fed straight into the per-order moment accumulators;
//! the increment sequence itself is never stored.

use log::trace;

use crate::config::EngineConfig;
use crate::errors::{StructureFunctionError, StructureFunctionResult};
use crate::moments::{reduce_into, MomentAccumulator};
use crate::partition::WorkUnit;

/// Per-worker accumulator, reused across the lags the worker owns.
#[derive(Debug)]
pub struct IncrementAccumulator<'a> {
    signal: &'a [f64],
    orders: &'a [f64],
    config: &'a EngineConfig,
    accumulators: Vec<MomentAccumulator>,
    increment_count: usize,
}

impl<'a> IncrementAccumulator<'a> {
    /// Accumulator over `signal` for every order in `orders`.
    pub fn new(signal: &'a [f64], orders: &'a [f64], config: &'a EngineConfig) -> Self {
        Self {
            signal,
            orders,
            config,
            accumulators: Vec::with_capacity(orders.len()),
            increment_count: 0,
        }
    }

    /// Run one pass over the signal for `unit.lag`.
    ///
    /// Returns the number of increments M = N - τ.
    pub fn accumulate(&mut self, unit: WorkUnit) -> StructureFunctionResult<usize> {
        let signal = self.signal;
        let n = signal.len();
        let WorkUnit { lag_index, lag } = unit;

        if lag >= n {
            return Err(StructureFunctionError::LagOutOfRange {
                lag,
                lag_index,
                signal_length: n,
            });
        }
        if lag == 0 {
            return Err(StructureFunctionError::invalid(
                "lags",
                format!("must be positive, got 0 at index {}", lag_index),
            ));
        }

        let m = n - lag;
        let compensated = self.config.uses_compensation(m);
        let policy = self.config.zero_increment_policy;

        self.accumulators.clear();
        self.accumulators.extend(
            self.orders
                .iter()
                .map(|&q| MomentAccumulator::new(q, policy, compensated)),
        );
        self.increment_count = 0;

        let head = &signal[..m];
        let tail = &signal[lag..];
        for (position, (&x0, &x1)) in head.iter().zip(tail).enumerate() {
            let increment = (x1 - x0).abs();
            for (order_index, acc) in self.accumulators.iter_mut().enumerate() {
                if acc.push(increment).is_err() {
                    return Err(StructureFunctionError::NonPositiveIncrementForNegativeOrder {
                        order: acc.order(),
                        order_index,
                        lag,
                        lag_index,
                        position,
                    });
                }
            }
        }

        self.increment_count = m;
        trace!(
            "lag {} (column {}): {} increments, compensated = {}",
            lag,
            lag_index,
            m,
            compensated
        );
        Ok(m)
    }

    /// Write the reduced moments of the last accumulated lag into its column.
    pub fn write_column(&self, values: &mut [f64], excluded: &mut [usize]) {
        reduce_into(&self.accumulators, self.increment_count, values, excluded);
    }
}

/// Materialized absolute increments of `signal` at `lag`.
///
/// The engine never calls this; it exists for callers that want to inspect
/// the increment distribution of a single lag.
///
/// # Example
/// ```rust
/// use structure_functions::increments::absolute_increments;
///
/// let a = absolute_increments(&[1.0, 4.0, 2.0, 2.0], 1).unwrap();
/// assert_eq!(a, vec![3.0, 2.0, 0.0]);
/// ```
pub fn absolute_increments(signal: &[f64], lag: usize) -> StructureFunctionResult<Vec<f64>> {
    if lag == 0 {
        return Err(StructureFunctionError::invalid("lag", "must be positive"));
    }
    if lag >= signal.len() {
        return Err(StructureFunctionError::LagOutOfRange {
            lag,
            lag_index: 0,
            signal_length: signal.len(),
        });
    }

    Ok(signal
        .windows(lag + 1)
        .map(|w| (w[lag] - w[0]).abs())
        .collect())
}
