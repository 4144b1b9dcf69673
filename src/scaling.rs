//! Scaling analysis of computed structure functions.
//!
//! For a scale-invariant signal S(q, τ) ∝ τ^ζ(q). The scaling function ζ(q) is
//! estimated per order as the slope of log2 S(q, τ) against log2 τ over a
//! chosen lag support, optionally weighting each lag by its increment count
//! N - τ. The Hurst exponent follows as H = ζ(2) / 2, and the Legendre
//! transform of ζ gives the singularity spectrum D(h). A direct estimate of
//! the spectrum that avoids differentiating ζ lives in [`crate::spectrum`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::assembler::StructureFunctions;
use crate::config::constants::MIN_REGRESSION_POINTS;
use crate::errors::{StructureFunctionError, StructureFunctionResult};
use crate::math_utils::wls_regression;

/// Per-lag weights of the scaling regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RegressionWeighting {
    /// Every lag counts equally
    #[default]
    Unweighted,
    /// Lag τ is weighted by its number of increments N - τ
    IncrementCount,
}

/// Configuration of the scaling regression.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalingConfig {
    /// Inclusive (min, max) lag values used in the fit; `None` uses every lag
    pub lag_range: Option<(usize, usize)>,
    /// Regression weights
    pub weighting: RegressionWeighting,
}

impl ScalingConfig {
    /// Restrict the fit to lags in `[min_lag, max_lag]`.
    pub fn with_lag_range(min_lag: usize, max_lag: usize) -> Self {
        Self {
            lag_range: Some((min_lag, max_lag)),
            ..Self::default()
        }
    }

    /// Set the regression weighting.
    pub fn weighting(mut self, weighting: RegressionWeighting) -> Self {
        self.weighting = weighting;
        self
    }
}

/// One point of the singularity spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpectrumPoint {
    /// Order q the point was derived from
    pub q: f64,
    /// Hölder exponent h(q)
    pub h: f64,
    /// Singularity dimension D(q)
    pub d: f64,
}

/// Estimated scaling function ζ(q).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalingFunction {
    orders: Vec<f64>,
    zeta: Vec<f64>,
    intercepts: Vec<f64>,
    std_errors: Vec<f64>,
    lags_used: Vec<usize>,
}

impl ScalingFunction {
    /// Orders, in the order of the structure-function rows.
    pub fn orders(&self) -> &[f64] {
        &self.orders
    }

    /// ζ(q) per order.
    pub fn zeta(&self) -> &[f64] {
        &self.zeta
    }

    /// Regression intercepts per order (log2 units).
    pub fn intercepts(&self) -> &[f64] {
        &self.intercepts
    }

    /// Standard errors of ζ(q) per order.
    pub fn std_errors(&self) -> &[f64] {
        &self.std_errors
    }

    /// Lags that entered the regression.
    pub fn lags_used(&self) -> &[usize] {
        &self.lags_used
    }

    fn position(&self, q: f64) -> Option<usize> {
        self.orders.iter().position(|&o| o == q)
    }

    /// ζ(q) for an order present in the analysis.
    pub fn zeta_at(&self, q: f64) -> Option<f64> {
        self.position(q).map(|i| self.zeta[i])
    }

    /// Regression intercept for an order present in the analysis.
    pub fn intercept_at(&self, q: f64) -> Option<f64> {
        self.position(q).map(|i| self.intercepts[i])
    }

    /// H = ζ(2) / 2, when q = 2 was analysed.
    pub fn hurst_exponent(&self) -> Option<f64> {
        self.zeta_at(2.0).map(|z| z / 2.0)
    }

    /// Legendre transform of ζ(q): h = dζ/dq and D = 1 + q h - ζ(q).
    ///
    /// h(q) is estimated with central differences over the distinct orders
    /// sorted by q (one-sided differences at both ends). Needs at least three
    /// distinct orders.
    pub fn singularity_spectrum(&self) -> StructureFunctionResult<Vec<SpectrumPoint>> {
        let mut points: Vec<(f64, f64)> = self
            .orders
            .iter()
            .copied()
            .zip(self.zeta.iter().copied())
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|b, a| a.0 == b.0);

        if points.len() < 3 {
            return Err(StructureFunctionError::InsufficientData {
                required: 3,
                actual: points.len(),
            });
        }

        let last = points.len() - 1;
        let spectrum = (0..points.len())
            .map(|i| {
                let (lo, hi) = match i {
                    0 => (0, 1),
                    i if i == last => (last - 1, last),
                    i => (i - 1, i + 1),
                };
                let h = (points[hi].1 - points[lo].1) / (points[hi].0 - points[lo].0);
                let (q, zeta) = points[i];
                SpectrumPoint {
                    q,
                    h,
                    d: 1.0 + q * h - zeta,
                }
            })
            .collect();
        Ok(spectrum)
    }
}

/// Lags selected for a scaling regression, with abscissae and weights.
#[derive(Debug, Clone)]
pub(crate) struct RegressionSupport {
    /// Positions of the selected lags in the lag set
    pub indices: Vec<usize>,
    /// Selected lag values
    pub lags: Vec<usize>,
    /// log2 τ per selected lag
    pub x: Vec<f64>,
    /// Regression weight per selected lag
    pub weights: Vec<f64>,
}

impl RegressionSupport {
    /// Select the lags of `lags` inside `config.lag_range`.
    pub(crate) fn select(
        lags: &[usize],
        signal_length: usize,
        config: &ScalingConfig,
    ) -> StructureFunctionResult<Self> {
        let (min_lag, max_lag) = config.lag_range.unwrap_or((usize::MIN, usize::MAX));
        if min_lag > max_lag {
            return Err(StructureFunctionError::invalid(
                "lag_range",
                format!("min {} exceeds max {}", min_lag, max_lag),
            ));
        }

        let indices: Vec<usize> = lags
            .iter()
            .enumerate()
            .filter(|(_, &lag)| lag >= min_lag && lag <= max_lag)
            .map(|(j, _)| j)
            .collect();
        if indices.len() < MIN_REGRESSION_POINTS {
            return Err(StructureFunctionError::InsufficientData {
                required: MIN_REGRESSION_POINTS,
                actual: indices.len(),
            });
        }

        let lags: Vec<usize> = indices.iter().map(|&j| lags[j]).collect();
        let x = lags.iter().map(|&lag| (lag as f64).log2()).collect();
        let weights = match config.weighting {
            RegressionWeighting::Unweighted => vec![1.0; lags.len()],
            RegressionWeighting::IncrementCount => lags
                .iter()
                .map(|&lag| signal_length.saturating_sub(lag) as f64)
                .collect(),
        };

        Ok(Self {
            indices,
            lags,
            x,
            weights,
        })
    }
}

/// Estimate ζ(q) for every order of `sf`.
///
/// # Errors
/// - `InsufficientData` when fewer than three lags fall inside the support.
/// - `NumericalError` when a structure-function value in the support is not
///   strictly positive and finite, or when all selected lags are equal.
pub fn estimate_scaling_function(
    sf: &StructureFunctions,
    config: &ScalingConfig,
) -> StructureFunctionResult<ScalingFunction> {
    let support = RegressionSupport::select(sf.lags(), sf.signal_length(), config)?;

    let n_orders = sf.orders().len();
    let mut zeta = Vec::with_capacity(n_orders);
    let mut intercepts = Vec::with_capacity(n_orders);
    let mut std_errors = Vec::with_capacity(n_orders);

    for (&q, row) in sf.orders().iter().zip(sf.values().to_rows()) {
        let mut y = Vec::with_capacity(support.indices.len());
        for &j in &support.indices {
            let value = row[j];
            if !(value.is_finite() && value > 0.0) {
                return Err(StructureFunctionError::NumericalError {
                    reason: format!(
                        "S(q = {}, lag = {}) = {} has no finite logarithm",
                        q,
                        sf.lags()[j],
                        value
                    ),
                    operation: Some("estimate_scaling_function".to_string()),
                });
            }
            y.push(value.log2());
        }

        let fit = wls_regression(&support.x, &y, &support.weights)?;
        zeta.push(fit.slope);
        intercepts.push(fit.intercept);
        std_errors.push(fit.slope_std_error);
    }

    Ok(ScalingFunction {
        orders: sf.orders().to_vec(),
        zeta,
        intercepts,
        std_errors,
        lags_used: support.lags,
    })
}
