//! Regression helpers for scaling-exponent estimation.

use crate::errors::{StructureFunctionError, StructureFunctionResult};

/// Tolerances shared by the regression code.
pub mod constants {
    /// Minimum weighted spread of the predictor before a fit is considered singular
    pub const MIN_PREDICTOR_SPREAD: f64 = 1e-12;
}

/// Slope and intercept of a straight-line fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Fitted slope
    pub slope: f64,
    /// Fitted intercept
    pub intercept: f64,
    /// Standard error of the slope (0 for an exact fit, NaN with 2 points)
    pub slope_std_error: f64,
}

/// Ordinary least squares fit of `y` on `x`.
///
/// # Example
/// ```rust
/// use structure_functions::math_utils::ols_regression;
///
/// let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let y = vec![3.0, 5.0, 7.0, 9.0, 11.0];
/// let fit = ols_regression(&x, &y).unwrap();
/// assert!((fit.slope - 2.0).abs() < 1e-12);
/// assert!((fit.intercept - 1.0).abs() < 1e-12);
/// ```
pub fn ols_regression(x: &[f64], y: &[f64]) -> StructureFunctionResult<LinearFit> {
    let weights = vec![1.0; x.len()];
    wls_regression(x, y, &weights)
}

/// Weighted least squares fit minimizing Σ w_i (y_i - b - a x_i)².
///
/// Weights are normalized to sum to n, and the data are centred on their
/// weighted means before forming the normal equations.
pub fn wls_regression(x: &[f64], y: &[f64], weights: &[f64]) -> StructureFunctionResult<LinearFit> {
    if x.len() != y.len() || x.len() != weights.len() || x.len() < 2 {
        return Err(StructureFunctionError::InsufficientData {
            required: 2,
            actual: x.len().min(y.len()).min(weights.len()),
        });
    }

    if !x.iter().all(|v| v.is_finite())
        || !y.iter().all(|v| v.is_finite())
        || !weights.iter().all(|&w| w.is_finite() && w > 0.0)
    {
        return Err(StructureFunctionError::NumericalError {
            reason: "Non-finite or non-positive values in regression data".to_string(),
            operation: Some("wls_regression".to_string()),
        });
    }

    let n = x.len() as f64;
    let weight_sum: f64 = weights.iter().sum();
    let normalized: Vec<f64> = weights.iter().map(|&w| w * n / weight_sum).collect();

    let mean_x = x.iter().zip(&normalized).map(|(xi, wi)| wi * xi).sum::<f64>() / n;
    let mean_y = y.iter().zip(&normalized).map(|(yi, wi)| wi * yi).sum::<f64>() / n;

    let mut sum_wxx = 0.0;
    let mut sum_wxy = 0.0;
    for ((xi, yi), wi) in x.iter().zip(y).zip(&normalized) {
        let dx = xi - mean_x;
        sum_wxx += wi * dx * dx;
        sum_wxy += wi * dx * (yi - mean_y);
    }

    if sum_wxx < constants::MIN_PREDICTOR_SPREAD {
        return Err(StructureFunctionError::NumericalError {
            reason: "Predictor variable has zero variance (constant values)".to_string(),
            operation: Some("wls_regression".to_string()),
        });
    }

    let slope = sum_wxy / sum_wxx;
    let intercept = mean_y - slope * mean_x;

    let rss: f64 = x
        .iter()
        .zip(y)
        .zip(&normalized)
        .map(|((xi, yi), wi)| {
            let residual = yi - (intercept + slope * xi);
            wi * residual * residual
        })
        .sum();
    let slope_std_error = if x.len() > 2 {
        (rss / (n - 2.0) / sum_wxx).sqrt()
    } else {
        f64::NAN
    };

    Ok(LinearFit {
        slope,
        intercept,
        slope_std_error,
    })
}
