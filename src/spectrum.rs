//! Direct multifractal spectrum estimate in the lag domain.
//!
//! At lag τ the n = N - τ absolute increments a_t are turned into weights
//!
//! ```text
//! R_q(t) = a_t^q / Σ_s a_s^q
//! U(τ, q) = log2 n + Σ_t R_q(t) log2 R_q(t)
//! V(τ, q) = Σ_t R_q(t) log2 a_t
//! ```
//!
//! and the spectrum follows from regressions against log2 τ over the lag
//! support: D(q) = 1 + slope(U) and h(q) = slope(V). No derivative of ζ(q)
//! is taken, unlike [`crate::ScalingFunction::singularity_spectrum`].
//!
//! Powers are taken relative to the largest increment (q > 0) or the smallest
//! non-zero increment (q <= 0), so every weight lies in (0, 1] and the sums
//! cannot overflow for large |q|.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;

use crate::assembler::ResultMatrix;
use crate::config::constants;
use crate::errors::{
    validate_all_finite, validate_allocation_size, validate_data_length, validate_lags,
    validate_orders, StructureFunctionError, StructureFunctionResult,
};
use crate::increments::absolute_increments;
use crate::math_utils::wls_regression;
use crate::moments::{fast_power, NeumaierSum};
use crate::scaling::{RegressionSupport, ScalingConfig, SpectrumPoint};

/// U(τ, q), V(τ, q) and the fitted spectrum (h(q), D(q)).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MultifractalSpectrum {
    orders: Vec<f64>,
    lags: Vec<usize>,
    lags_used: Vec<usize>,
    u: ResultMatrix,
    v: ResultMatrix,
    d: Vec<f64>,
    h: Vec<f64>,
}

impl MultifractalSpectrum {
    /// Orders, in caller order.
    pub fn orders(&self) -> &[f64] {
        &self.orders
    }

    /// Every lag U and V were evaluated at, in caller order.
    pub fn lags(&self) -> &[usize] {
        &self.lags
    }

    /// Lags that entered the regressions.
    pub fn lags_used(&self) -> &[usize] {
        &self.lags_used
    }

    /// U(τ, q) as an |orders| × |lags| matrix.
    pub fn u(&self) -> &ResultMatrix {
        &self.u
    }

    /// V(τ, q) as an |orders| × |lags| matrix.
    pub fn v(&self) -> &ResultMatrix {
        &self.v
    }

    /// D(q) per order.
    pub fn dimensions(&self) -> &[f64] {
        &self.d
    }

    /// h(q) per order.
    pub fn holder_exponents(&self) -> &[f64] {
        &self.h
    }

    /// (q, h(q), D(q)) per order, in caller order.
    pub fn points(&self) -> Vec<SpectrumPoint> {
        self.orders
            .iter()
            .zip(&self.h)
            .zip(&self.d)
            .map(|((&q, &h), &d)| SpectrumPoint { q, h, d })
            .collect()
    }

    /// Width max h - min h of the spectrum; 0 for a monofractal signal.
    pub fn width(&self) -> f64 {
        let (lo, hi) = self
            .h
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            });
        hi - lo
    }
}

/// Estimate the multifractal spectrum of `signal` from its increments.
///
/// Orders may be negative. Zero increments carry no weight for q > 0.
///
/// # Errors
/// - The input errors of [`crate::compute`].
/// - `NonPositiveIncrementForNegativeOrder` when a zero increment meets q < 0.
/// - `NumericalError` when a zero increment meets q = 0, or when every
///   increment of a lag is zero.
/// - The support errors of [`crate::estimate_scaling_function`].
///
/// # Example
/// ```rust
/// use structure_functions::{multifractal_spectrum, ScalingConfig};
///
/// let ramp: Vec<f64> = (0..128).map(|t| 0.5 * t as f64).collect();
/// let spectrum = multifractal_spectrum(&ramp, &[1, 2, 4, 8], &[1.0, 2.0], &ScalingConfig::default())
///     .unwrap();
/// for point in spectrum.points() {
///     assert!((point.h - 1.0).abs() < 1e-9);
///     assert!((point.d - 1.0).abs() < 1e-9);
/// }
/// ```
pub fn multifractal_spectrum(
    signal: &[f64],
    lags: &[usize],
    orders: &[f64],
    config: &ScalingConfig,
) -> StructureFunctionResult<MultifractalSpectrum> {
    validate_data_length(signal, constants::MIN_SIGNAL_LENGTH)?;
    validate_all_finite(signal, "signal")?;
    validate_orders(orders)?;
    validate_lags(lags, signal.len())?;
    validate_allocation_size(orders.len().saturating_mul(lags.len()))?;
    let support = RegressionSupport::select(lags, signal.len(), config)?;

    let columns = lag_columns(signal, lags, orders)?;
    let mut u_data = Vec::with_capacity(orders.len() * lags.len());
    let mut v_data = Vec::with_capacity(orders.len() * lags.len());
    for (u_col, v_col) in columns {
        u_data.extend(u_col);
        v_data.extend(v_col);
    }
    let u = ResultMatrix::from_column_major(orders.len(), lags.len(), u_data);
    let v = ResultMatrix::from_column_major(orders.len(), lags.len(), v_data);

    let mut d = Vec::with_capacity(orders.len());
    let mut h = Vec::with_capacity(orders.len());
    for (u_row, v_row) in u.to_rows().iter().zip(v.to_rows()) {
        let u_support: Vec<f64> = support.indices.iter().map(|&j| u_row[j]).collect();
        let v_support: Vec<f64> = support.indices.iter().map(|&j| v_row[j]).collect();
        d.push(1.0 + wls_regression(&support.x, &u_support, &support.weights)?.slope);
        h.push(wls_regression(&support.x, &v_support, &support.weights)?.slope);
    }

    debug!(
        "multifractal spectrum: {} orders over {} of {} lags",
        orders.len(),
        support.lags.len(),
        lags.len()
    );

    Ok(MultifractalSpectrum {
        orders: orders.to_vec(),
        lags: lags.to_vec(),
        lags_used: support.lags,
        u,
        v,
        d,
        h,
    })
}

type LagColumn = (Vec<f64>, Vec<f64>);

#[cfg(feature = "parallel")]
fn lag_columns(
    signal: &[f64],
    lags: &[usize],
    orders: &[f64],
) -> StructureFunctionResult<Vec<LagColumn>> {
    use rayon::prelude::*;

    lags.par_iter()
        .enumerate()
        .map(|(lag_index, &lag)| lag_column(signal, lag_index, lag, orders))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn lag_columns(
    signal: &[f64],
    lags: &[usize],
    orders: &[f64],
) -> StructureFunctionResult<Vec<LagColumn>> {
    lags.iter()
        .enumerate()
        .map(|(lag_index, &lag)| lag_column(signal, lag_index, lag, orders))
        .collect()
}

/// U(τ, q) and V(τ, q) for every order at one lag.
fn lag_column(
    signal: &[f64],
    lag_index: usize,
    lag: usize,
    orders: &[f64],
) -> StructureFunctionResult<LagColumn> {
    let increments = absolute_increments(signal, lag)?;
    let n = increments.len();
    let log_increments: Vec<f64> = increments.iter().map(|a| a.log2()).collect();

    let first_zero = increments.iter().position(|&a| a == 0.0);
    let largest = increments.iter().copied().fold(0.0, f64::max);
    if largest == 0.0 {
        return Err(StructureFunctionError::NumericalError {
            reason: format!("every increment at lag {} is zero", lag),
            operation: Some("multifractal_spectrum".to_string()),
        });
    }
    let smallest_positive = increments
        .iter()
        .copied()
        .filter(|&a| a > 0.0)
        .fold(f64::INFINITY, f64::min);

    let mut u = Vec::with_capacity(orders.len());
    let mut v = Vec::with_capacity(orders.len());
    for (order_index, &q) in orders.iter().enumerate() {
        if let (Some(position), true) = (first_zero, q <= 0.0) {
            return Err(if q < 0.0 {
                StructureFunctionError::NonPositiveIncrementForNegativeOrder {
                    order: q,
                    order_index,
                    lag,
                    lag_index,
                    position,
                }
            } else {
                StructureFunctionError::NumericalError {
                    reason: format!(
                        "zero increment at position {} for lag {} has no logarithm",
                        position, lag
                    ),
                    operation: Some("multifractal_spectrum".to_string()),
                }
            });
        }

        let reference = if q > 0.0 { largest } else { smallest_positive };
        let log_reference = reference.log2();

        let mut mass = NeumaierSum::new();
        let mut entropy = NeumaierSum::new();
        let mut holder = NeumaierSum::new();
        for (&a, &log_a) in increments.iter().zip(&log_increments) {
            if a == 0.0 {
                continue;
            }
            let weight = fast_power(a / reference, q);
            if weight == 0.0 {
                continue;
            }
            mass.add(weight);
            entropy.add(weight * q * (log_a - log_reference));
            holder.add(weight * log_a);
        }

        // The reference increment has weight 1, so the mass is at least 1.
        let mass = mass.total();
        u.push((n as f64).log2() + entropy.total() / mass - mass.log2());
        v.push(holder.total() / mass);
    }

    Ok((u, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::RegressionWeighting;
    use assert_approx_eq::assert_approx_eq;

    fn ramp(length: usize) -> Vec<f64> {
        (0..length).map(|t| t as f64).collect()
    }

    #[test]
    fn test_ramp_spectrum_is_a_point() {
        // Every increment at lag τ equals τ: R is uniform, U = 0 and V = log2 τ.
        let signal = ramp(512);
        let lags = [1, 2, 4, 8, 16, 32, 64];
        let orders = [-2.0, -0.5, 0.0, 0.5, 1.0, 2.0, 5.0];

        for weighting in [RegressionWeighting::Unweighted, RegressionWeighting::IncrementCount] {
            let config = ScalingConfig::default().weighting(weighting);
            let spectrum = multifractal_spectrum(&signal, &lags, &orders, &config).unwrap();

            for point in spectrum.points() {
                assert_approx_eq!(point.h, 1.0, 1e-9);
                assert_approx_eq!(point.d, 1.0, 1e-9);
            }
            for (j, &lag) in lags.iter().enumerate() {
                for i in 0..orders.len() {
                    assert_approx_eq!(spectrum.u().get(i, j).unwrap(), 0.0, 1e-9);
                    assert_approx_eq!(spectrum.v().get(i, j).unwrap(), (lag as f64).log2(), 1e-12);
                }
            }
            assert_approx_eq!(spectrum.width(), 0.0, 1e-9);
        }
    }

    #[test]
    fn test_weights_follow_the_largest_increments() {
        // Lag 1 increments: 1, 3. For large q nearly all weight sits on 3.
        let signal = [0.0, 1.0, 4.0];
        let config = ScalingConfig::default();
        let columns = lag_columns(&signal, &[1], &[1.0, 40.0]).unwrap();
        let (u, v) = &columns[0];

        // q = 1: R = (1/4, 3/4)
        let entropy = 0.25 * 0.25f64.log2() + 0.75 * 0.75f64.log2();
        assert_approx_eq!(u[0], 1.0 + entropy, 1e-12);
        assert_approx_eq!(v[0], 0.75 * 3.0f64.log2(), 1e-12);

        // q = 40: U → log2 2 + 0, V → log2 3
        assert_approx_eq!(u[1], 1.0, 1e-12);
        assert_approx_eq!(v[1], 3.0f64.log2(), 1e-12);

        assert!(multifractal_spectrum(&signal, &[1], &[1.0], &config).is_err());
    }

    #[test]
    fn test_large_orders_do_not_overflow() {
        let signal: Vec<f64> = (0..200).map(|t| 1e3 * (t as f64 * 0.37).sin()).collect();
        let spectrum =
            multifractal_spectrum(&signal, &[1, 2, 4, 8], &[-30.0, 150.0], &ScalingConfig::default())
                .unwrap();
        assert!(spectrum.u().as_column_major().iter().all(|x| x.is_finite()));
        assert!(spectrum.v().as_column_major().iter().all(|x| x.is_finite()));
        assert!(spectrum.holder_exponents().iter().all(|h| h.is_finite()));
    }

    #[test]
    fn test_zero_increments() {
        // Lag 1 has a zero increment at t = 2.
        let signal = [0.0, 1.0, 3.0, 3.0, 7.0, 8.0, 12.0, 13.0, 20.0];
        let lags = [1, 2, 4];
        let config = ScalingConfig::default();

        // Positive orders ignore the zero.
        assert!(multifractal_spectrum(&signal, &lags, &[1.0, 2.0], &config).is_ok());

        match multifractal_spectrum(&signal, &lags, &[1.0, -1.0], &config) {
            Err(StructureFunctionError::NonPositiveIncrementForNegativeOrder {
                order_index,
                lag,
                lag_index,
                position,
                ..
            }) => {
                assert_eq!(order_index, 1);
                assert_eq!(lag, 1);
                assert_eq!(lag_index, 0);
                assert_eq!(position, 2);
            }
            other => panic!("Expected NonPositiveIncrementForNegativeOrder, got {:?}", other),
        }

        assert!(matches!(
            multifractal_spectrum(&signal, &lags, &[0.0], &config),
            Err(StructureFunctionError::NumericalError { .. })
        ));
        assert!(matches!(
            multifractal_spectrum(&[2.0; 16], &lags, &[1.0], &config),
            Err(StructureFunctionError::NumericalError { .. })
        ));
    }

    #[test]
    fn test_input_and_support_errors() {
        let signal = ramp(32);
        let config = ScalingConfig::default();

        assert!(matches!(
            multifractal_spectrum(&signal, &[1, 2, 32], &[1.0], &config),
            Err(StructureFunctionError::LagOutOfRange { lag: 32, .. })
        ));
        assert!(matches!(
            multifractal_spectrum(&signal, &[1, 2, 4], &[], &config),
            Err(StructureFunctionError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            multifractal_spectrum(&signal, &[1, 2, 4, 8], &[1.0], &ScalingConfig::with_lag_range(4, 8)),
            Err(StructureFunctionError::InsufficientData { required: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_u_and_v_cover_lags_outside_support() {
        let signal = ramp(64);
        let config = ScalingConfig::with_lag_range(2, 8);
        let spectrum = multifractal_spectrum(&signal, &[1, 2, 4, 8, 16], &[1.0, 2.0], &config).unwrap();

        assert_eq!(spectrum.lags_used(), &[2, 4, 8]);
        assert_eq!(spectrum.u().shape(), (2, 5));
        assert_approx_eq!(spectrum.v().get(0, 4).unwrap(), 4.0, 1e-12);
        assert_eq!(spectrum.orders(), &[1.0, 2.0]);
        assert_eq!(spectrum.lags(), &[1, 2, 4, 8, 16]);
    }
}
