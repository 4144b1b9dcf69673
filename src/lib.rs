//! # Structure Functions
//!
//! Multi-threaded computation of generalized structure functions for
//! multifractal analysis of scalar time series.
//!
//! For a signal x of length N, a set of lags τ and a set of orders q the crate
//! computes
//!
//! ```text
//! S(q, τ) = 1/(N - τ) · Σ_t |x(t + τ) - x(t)|^q
//! ```
//!
//! and returns the |q| × |τ| matrix together with echoes of both index sets.
//! Lags are split across a fixed pool of worker threads; each worker owns a
//! disjoint block of result columns, so the matrix needs no locking and the
//! values do not depend on the number of workers.
//!
//! ## Quick Start
//!
//! ```rust
//! use structure_functions::{compute, estimate_scaling_function, ScalingConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Deterministic zig-zag walk
//!     let signal: Vec<f64> = (0..4096)
//!         .map(|t| (t as f64 * 0.37).sin() + 0.01 * t as f64)
//!         .collect();
//!
//!     let lags = [1, 2, 4, 8, 16, 32];
//!     let orders = [0.5, 1.0, 2.0, 3.0];
//!
//!     // 0 workers: use every available hardware thread
//!     let sf = compute(&signal, &lags, &orders, 0)?;
//!     assert_eq!(sf.shape(), (4, 6));
//!
//!     let scaling = estimate_scaling_function(&sf, &ScalingConfig::default())?;
//!     println!("zeta(q) = {:?}", scaling.zeta());
//!     Ok(())
//! }
//! ```
//!
//! ## Zero increments and negative orders
//!
//! A zero increment raised to a negative power is undefined. By default such a
//! call fails with [`StructureFunctionError::NonPositiveIncrementForNegativeOrder`];
//! [`ZeroIncrementPolicy::Exclude`] drops the zero increments from the
//! negative-order averages instead and reports how many were dropped.
//!
//! ## Cargo features
//!
//! - `parallel` (default): run workers on a `rayon` thread pool; without it all
//!   lags are processed on the calling thread.
//! - `serde`: `Serialize`/`Deserialize` for configuration and result types.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core kernel
pub mod assembler;
pub mod config;
pub mod engine;
pub mod errors;
pub mod increments;
pub mod moments;
pub mod partition;

// Downstream analysis
pub mod math_utils;
pub mod scaling;
pub mod spectrum;

// Re-exports for convenience - main public API
pub use assembler::{ResultMatrix, StructureFunctions};
pub use config::{EngineConfig, SummationMethod, ZeroIncrementPolicy};
pub use engine::{compute, compute_with_config};
pub use errors::{StructureFunctionError, StructureFunctionResult};
pub use scaling::{
    estimate_scaling_function, RegressionWeighting, ScalingConfig, ScalingFunction,
    SpectrumPoint,
};
pub use spectrum::{multifractal_spectrum, MultifractalSpectrum};
