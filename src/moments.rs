//! Moment accumulation and reduction.
//!
//! Each order q owns a [`MomentAccumulator`] that receives the absolute
//! increments of one lag and reduces them to
//!
//! ```text
//! S(q, τ) = (1 / M) Σ_t a_t^q,   M = N - τ
//! ```
//!
//! # Summation
//!
//! Below the compensation threshold (100 000 terms by default) terms are added
//! with plain sequential summation, whose error grows as O(M·ε)·Σ|a_t^q|.
//! Above it the Kahan-Babuška-Neumaier algorithm keeps a running compensation
//! term, bounding the error by (2ε + O(M·ε²))·Σ|a_t^q| independently of the
//! summation length to first order. Terms are always added in increasing t, so
//! a column's value never depends on which worker computed it.
//!
//! # Orders
//!
//! - q = 0 reduces to exactly 1, zero increments included.
//! - q < 0 with a zero increment is undefined; see [`ZeroIncrementPolicy`].
//! - q > 0 uses real exponentiation of the non-negative increment.

use crate::config::ZeroIncrementPolicy;

/// Kahan-Babuška-Neumaier running sum.
///
/// Unlike plain Kahan summation the compensation is also correct when the
/// incoming term is larger in magnitude than the running sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeumaierSum {
    sum: f64,
    compensation: f64,
}

impl NeumaierSum {
    /// Empty sum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one term.
    #[inline]
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    /// Compensated total.
    #[inline]
    pub fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Compensated sum of a slice.
///
/// # Example
/// ```rust
/// use structure_functions::moments::compensated_sum;
///
/// let values = [1.0, 1e100, 1.0, -1e100];
/// assert_eq!(compensated_sum(&values), 2.0);
/// ```
pub fn compensated_sum(values: &[f64]) -> f64 {
    let mut acc = NeumaierSum::new();
    for &value in values {
        acc.add(value);
    }
    acc.total()
}

/// `base^order` with fast paths for integer orders.
///
/// `base` is an absolute increment, so it is never negative.
#[inline]
pub fn fast_power(base: f64, order: f64) -> f64 {
    if order == 1.0 {
        base
    } else if order == 2.0 {
        base * base
    } else if order.fract() == 0.0 && order.abs() <= i32::MAX as f64 {
        base.powi(order as i32)
    } else {
        base.powf(order)
    }
}

#[derive(Debug, Clone, Copy)]
enum RunningSum {
    Naive(f64),
    Compensated(NeumaierSum),
}

impl RunningSum {
    fn new(compensated: bool) -> Self {
        if compensated {
            RunningSum::Compensated(NeumaierSum::new())
        } else {
            RunningSum::Naive(0.0)
        }
    }

    #[inline]
    fn add(&mut self, value: f64) {
        match self {
            RunningSum::Naive(sum) => *sum += value,
            RunningSum::Compensated(acc) => acc.add(value),
        }
    }

    fn total(&self) -> f64 {
        match self {
            RunningSum::Naive(sum) => *sum,
            RunningSum::Compensated(acc) => acc.total(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderKind {
    Zero,
    Positive,
    Negative,
}

/// A zero increment was rejected for a negative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroIncrement;

/// Reduced value of one (order, lag) cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moment {
    /// S(q, τ); NaN when every increment was excluded
    pub value: f64,
    /// Zero increments left out of the average
    pub excluded: usize,
}

/// Running moment of a single order for a single lag.
#[derive(Debug, Clone)]
pub struct MomentAccumulator {
    order: f64,
    kind: OrderKind,
    policy: ZeroIncrementPolicy,
    sum: RunningSum,
    excluded: usize,
}

impl MomentAccumulator {
    /// New accumulator for `order`.
    pub fn new(order: f64, policy: ZeroIncrementPolicy, compensated: bool) -> Self {
        let kind = if order == 0.0 {
            OrderKind::Zero
        } else if order > 0.0 {
            OrderKind::Positive
        } else {
            OrderKind::Negative
        };

        Self {
            order,
            kind,
            policy,
            sum: RunningSum::new(compensated),
            excluded: 0,
        }
    }

    /// The order q.
    pub fn order(&self) -> f64 {
        self.order
    }

    /// Feed one absolute increment.
    ///
    /// Fails only for a zero increment on a negative order under
    /// [`ZeroIncrementPolicy::Reject`].
    #[inline]
    pub fn push(&mut self, increment: f64) -> Result<(), ZeroIncrement> {
        match self.kind {
            OrderKind::Zero => {}
            OrderKind::Positive => self.sum.add(fast_power(increment, self.order)),
            OrderKind::Negative => {
                if increment == 0.0 {
                    match self.policy {
                        ZeroIncrementPolicy::Reject => return Err(ZeroIncrement),
                        ZeroIncrementPolicy::Exclude => self.excluded += 1,
                    }
                } else {
                    self.sum.add(fast_power(increment, self.order));
                }
            }
        }
        Ok(())
    }

    /// Reduce to the mean over `increment_count` increments.
    ///
    /// `increment_count` is the number of values pushed. A count below the
    /// number of excluded zeros leaves nothing to average and yields NaN.
    pub fn finish(&self, increment_count: usize) -> Moment {
        match self.kind {
            OrderKind::Zero => Moment {
                value: 1.0,
                excluded: 0,
            },
            OrderKind::Positive | OrderKind::Negative => {
                let contributing = increment_count.saturating_sub(self.excluded);
                let value = if contributing == 0 {
                    f64::NAN
                } else {
                    self.sum.total() / contributing as f64
                };
                Moment {
                    value,
                    excluded: self.excluded,
                }
            }
        }
    }
}

/// Write one column of reduced moments.
///
/// `values` and `excluded` are the column's exclusive slices, one entry per
/// order, in the same order as `accumulators`.
pub fn reduce_into(
    accumulators: &[MomentAccumulator],
    increment_count: usize,
    values: &mut [f64],
    excluded: &mut [usize],
) {
    debug_assert_eq!(accumulators.len(), values.len());
    debug_assert_eq!(accumulators.len(), excluded.len());

    for ((acc, value), skipped) in accumulators.iter().zip(values).zip(excluded) {
        let moment = acc.finish(increment_count);
        *value = moment.value;
        *skipped = moment.excluded;
    }
}
