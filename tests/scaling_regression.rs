//! Scaling regression checks on synthetic self-affine signals
//!
//! A Gaussian random walk is self-affine with Hurst exponent H = 1/2, so its
//! structure functions scale as S(q, τ) ∝ τ^(q/2). These tests compare the
//! fitted scaling function against that reference; they are statistical
//! checks with tolerances, not exact equalities.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use structure_functions::{
    compute, compute_with_config, estimate_scaling_function, multifractal_spectrum, EngineConfig,
    RegressionWeighting, ScalingConfig, SummationMethod,
};

fn random_walk(length: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut position = 0.0;
    (0..length)
        .map(|_| {
            let step: f64 = StandardNormal.sample(&mut rng);
            position += step;
            position
        })
        .collect()
}

fn dyadic_lags(max_exponent: u32) -> Vec<usize> {
    (0..=max_exponent).map(|k| 1usize << k).collect()
}

/// Test scenario: Hurst exponent of Brownian motion
#[test]
fn test_random_walk_hurst_exponent() {
    let signal = random_walk(1 << 16, 42);
    let lags = dyadic_lags(8);
    let orders = [0.0, 1.0, 2.0];

    let sf = compute(&signal, &lags, &orders, 0).unwrap();
    let scaling = estimate_scaling_function(&sf, &ScalingConfig::default()).unwrap();

    let hurst = scaling.hurst_exponent().unwrap();
    assert!(
        (hurst - 0.5).abs() < 0.05,
        "H = {:.4} should be close to 0.5",
        hurst
    );
    assert!((scaling.zeta_at(1.0).unwrap() - 0.5).abs() < 0.05);
    assert_eq!(scaling.zeta_at(0.0), Some(0.0));
}

/// Test scenario: ζ(q) of a monofractal walk is linear in q
#[test]
fn test_random_walk_scaling_function_is_linear() {
    let signal = random_walk(1 << 15, 7);
    let lags = dyadic_lags(7);
    let orders = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0];

    let sf = compute(&signal, &lags, &orders, 4).unwrap();
    let config = ScalingConfig::with_lag_range(2, 128).weighting(RegressionWeighting::IncrementCount);
    let scaling = estimate_scaling_function(&sf, &config).unwrap();

    for (&q, &zeta) in scaling.orders().iter().zip(scaling.zeta()) {
        assert!(
            (zeta - q / 2.0).abs() < 0.1 * q.max(1.0),
            "zeta({}) = {:.4}, expected about {}",
            q,
            zeta,
            q / 2.0
        );
    }

    // A monofractal signal has a narrow spectrum centred on H.
    let spectrum = scaling.singularity_spectrum().unwrap();
    for point in &spectrum {
        assert!((point.h - 0.5).abs() < 0.1, "h({}) = {:.4}", point.q, point.h);
        assert!((point.d - 1.0).abs() < 0.15, "D({}) = {:.4}", point.q, point.d);
    }
}

/// Test scenario: direct spectrum estimate of a monofractal walk
///
/// Gaussian increments at every lag share one shape up to the scale τ^(1/2),
/// so U(τ, q) is flat in τ and V(τ, q) grows as log2 τ / 2.
#[test]
fn test_random_walk_direct_spectrum() {
    let signal = random_walk(1 << 15, 11);
    let lags = dyadic_lags(7);
    let orders = [0.5, 1.0, 2.0];
    let config = ScalingConfig::with_lag_range(2, 128).weighting(RegressionWeighting::IncrementCount);

    let spectrum = multifractal_spectrum(&signal, &lags, &orders, &config).unwrap();
    assert_eq!(spectrum.lags_used(), &[2, 4, 8, 16, 32, 64, 128]);

    for point in spectrum.points() {
        assert!((point.h - 0.5).abs() < 0.1, "h({}) = {:.4}", point.q, point.h);
        assert!((point.d - 1.0).abs() < 0.1, "D({}) = {:.4}", point.q, point.d);
    }
    assert!(spectrum.width() < 0.15, "width = {:.4}", spectrum.width());
}

/// Test scenario: long series cross the compensated-summation threshold
///
/// Above 100 000 increments `SummationMethod::Auto` compensates, so it must
/// agree bit for bit with forced compensation, and stay within the plain
/// summation error bound of the naive result.
#[test]
fn test_long_series_compensation() {
    let signal = random_walk(150_001, 2024);
    let lags = [1, 10, 100, 60_000];
    let orders = [-1.0, 0.5, 2.0, 4.0];

    let auto = compute(&signal, &lags, &orders, 2).unwrap();
    let compensated = compute_with_config(
        &signal,
        &lags,
        &orders,
        &EngineConfig::with_workers(3).summation(SummationMethod::Compensated),
    )
    .unwrap();
    let naive = compute_with_config(
        &signal,
        &lags,
        &orders,
        &EngineConfig::with_workers(1).summation(SummationMethod::Naive),
    )
    .unwrap();

    // Lags 1..100 have > 100 000 increments; lag 60 000 has 90 001.
    for j in 0..3 {
        assert_eq!(auto.column(j), compensated.column(j));
    }
    assert_eq!(auto.column(3), naive.column(3));

    for (a, b) in naive
        .values()
        .as_column_major()
        .iter()
        .zip(compensated.values().as_column_major())
    {
        assert!((a - b).abs() <= 1e-9 * b.abs(), "{} vs {}", a, b);
    }
}
