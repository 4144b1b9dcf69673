//! Error types and validation functions for structure-function computation.
//!
//! Every failure of a `compute` call is reported through [`StructureFunctionError`].
//! The call is all-or-nothing: a single failing lag or order fails the whole
//! invocation and no partial matrix is returned.

use thiserror::Error;

/// Error types for structure-function computation and scaling analysis.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StructureFunctionError {
    /// Malformed lag set, order set, signal or worker configuration.
    #[error("Invalid configuration: {parameter} {reason}")]
    InvalidConfiguration {
        /// Name of the offending input
        parameter: String,
        /// What is wrong with it
        reason: String,
    },

    /// A lag is not strictly smaller than the signal length.
    #[error("Lag out of range: lag {lag} (index {lag_index}) must be < signal length {signal_length}")]
    LagOutOfRange {
        /// Offending lag value
        lag: usize,
        /// Position of the lag in the lag set
        lag_index: usize,
        /// Length of the signal
        signal_length: usize,
    },

    /// A zero increment was met while accumulating a negative order under the
    /// rejecting zero-increment policy.
    #[error(
        "Zero increment at position {position} for lag {lag} makes order q = {order} undefined"
    )]
    NonPositiveIncrementForNegativeOrder {
        /// Offending order
        order: f64,
        /// Position of the order in the order set
        order_index: usize,
        /// Lag being accumulated
        lag: usize,
        /// Position of the lag in the lag set
        lag_index: usize,
        /// Sample index t where |x(t + lag) - x(t)| == 0
        position: usize,
    },

    /// Internal invariant breach: a result column was not written exactly once.
    #[error("Incomplete result: column {lag_index} written {writes} times, expected exactly 1")]
    IncompleteResult {
        /// Column (lag index) that failed the check
        lag_index: usize,
        /// Number of times the column was written
        writes: usize,
    },

    /// Insufficient data for the requested operation.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum required data points
        required: usize,
        /// Actual number of data points provided
        actual: usize,
    },

    /// Numerical computation error in downstream scaling analysis.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for numerical failure
        reason: String,
        /// Operation that failed
        operation: Option<String>,
    },

    /// The worker pool could not be created.
    #[error("Concurrent execution failed: {resource}")]
    ConcurrencyError {
        /// Resource that couldn't be acquired
        resource: String,
    },
}

impl StructureFunctionError {
    /// Shorthand for [`StructureFunctionError::InvalidConfiguration`].
    pub fn invalid(parameter: &str, reason: impl Into<String>) -> Self {
        StructureFunctionError::InvalidConfiguration {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that indicate a defect in this crate rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, StructureFunctionError::IncompleteResult { .. })
    }
}

/// Result type for structure-function operations.
pub type StructureFunctionResult<T> = Result<T, StructureFunctionError>;

/// Validates that data has sufficient length for analysis.
///
/// # Example
/// ```rust
/// use structure_functions::errors::validate_data_length;
///
/// let data = vec![1.0, 2.0, 3.0];
/// assert!(validate_data_length(&data, 2).is_ok());
/// assert!(validate_data_length(&data, 5).is_err());
/// ```
pub fn validate_data_length(data: &[f64], min_required: usize) -> StructureFunctionResult<()> {
    if data.len() < min_required {
        Err(StructureFunctionError::InsufficientData {
            required: min_required,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first NaN or infinite value, naming its index.
///
/// # Example
/// ```rust
/// use structure_functions::errors::validate_all_finite;
///
/// assert!(validate_all_finite(&[1.0, 2.0, 3.0], "signal").is_ok());
/// assert!(validate_all_finite(&[1.0, f64::NAN, 3.0], "signal").is_err());
/// ```
pub fn validate_all_finite(data: &[f64], name: &str) -> StructureFunctionResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, &v)| !v.is_finite()) {
        let value_desc = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };

        return Err(StructureFunctionError::invalid(
            name,
            format!("contains non-finite value at index {}: {}", i, value_desc),
        ));
    }

    Ok(())
}

/// Validates a lag set against the signal length.
///
/// Empty sets and zero lags are configuration errors; a lag that is not
/// strictly below `signal_length` is reported as [`StructureFunctionError::LagOutOfRange`].
pub fn validate_lags(lags: &[usize], signal_length: usize) -> StructureFunctionResult<()> {
    if lags.is_empty() {
        return Err(StructureFunctionError::invalid("lags", "must not be empty"));
    }

    for (lag_index, &lag) in lags.iter().enumerate() {
        if lag == 0 {
            return Err(StructureFunctionError::invalid(
                "lags",
                format!("must be positive, got 0 at index {}", lag_index),
            ));
        }
        if lag >= signal_length {
            return Err(StructureFunctionError::LagOutOfRange {
                lag,
                lag_index,
                signal_length,
            });
        }
    }

    Ok(())
}

/// Validates an order set: non-empty and every order finite.
pub fn validate_orders(orders: &[f64]) -> StructureFunctionResult<()> {
    if orders.is_empty() {
        return Err(StructureFunctionError::invalid("orders", "must not be empty"));
    }
    validate_all_finite(orders, "orders")
}

/// Upper bound on the bytes a single call may allocate for its result.
const MAX_RESULT_BYTES: usize = 1 << 30;

/// Validates the size of the result matrix before allocating it.
///
/// Each cell holds an `f64` value and a `usize` exclusion count, so the check
/// covers both buffers against a 1 GiB cap.
pub fn validate_allocation_size(cells: usize) -> StructureFunctionResult<()> {
    let bytes_per_cell = std::mem::size_of::<f64>() + std::mem::size_of::<usize>();
    let max_cells = MAX_RESULT_BYTES / bytes_per_cell;

    if cells > max_cells {
        return Err(StructureFunctionError::invalid(
            "orders x lags",
            format!(
                "requests {} result cells ({:.2} GiB of values and exclusion counts), above the limit of {}",
                cells,
                cells as f64 * bytes_per_cell as f64 / (1024.0 * 1024.0 * 1024.0),
                max_cells
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_data_length_insufficient() {
        let data = vec![1.0];
        match validate_data_length(&data, 2) {
            Err(StructureFunctionError::InsufficientData { required, actual }) => {
                assert_eq!(required, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected InsufficientData error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_all_finite_reports_index() {
        let err = validate_all_finite(&[0.0, 1.0, f64::NEG_INFINITY], "signal").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("index 2"), "message was: {}", message);
        assert!(message.contains("-Infinity"));
    }

    #[test]
    fn test_validate_lags() {
        assert!(validate_lags(&[1, 2, 4], 5).is_ok());

        assert!(matches!(
            validate_lags(&[], 5),
            Err(StructureFunctionError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            validate_lags(&[1, 0], 5),
            Err(StructureFunctionError::InvalidConfiguration { .. })
        ));

        match validate_lags(&[1, 5, 2], 5) {
            Err(StructureFunctionError::LagOutOfRange {
                lag,
                lag_index,
                signal_length,
            }) => {
                assert_eq!(lag, 5);
                assert_eq!(lag_index, 1);
                assert_eq!(signal_length, 5);
            }
            other => panic!("Expected LagOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_orders() {
        assert!(validate_orders(&[-1.0, 0.0, 0.5, 2.0]).is_ok());
        assert!(validate_orders(&[]).is_err());
        assert!(validate_orders(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_validate_allocation_size() {
        assert!(validate_allocation_size(1000).is_ok());
        assert!(validate_allocation_size(1 << 28).is_err());

        // Values and exclusion counts share the cap.
        let bytes_per_cell = std::mem::size_of::<f64>() + std::mem::size_of::<usize>();
        let max_cells = MAX_RESULT_BYTES / bytes_per_cell;
        assert!(validate_allocation_size(max_cells).is_ok());
        assert!(validate_allocation_size(max_cells + 1).is_err());
        assert!(validate_allocation_size(usize::MAX).is_err());
    }

    #[test]
    fn test_error_display_formatting() {
        let err = StructureFunctionError::NonPositiveIncrementForNegativeOrder {
            order: -2.0,
            order_index: 0,
            lag: 3,
            lag_index: 1,
            position: 7,
        };
        assert_eq!(
            err.to_string(),
            "Zero increment at position 7 for lag 3 makes order q = -2 undefined"
        );

        let err = StructureFunctionError::IncompleteResult {
            lag_index: 4,
            writes: 0,
        };
        assert!(err.is_internal());
        assert!(!StructureFunctionError::invalid("lags", "must not be empty").is_internal());
    }
}
