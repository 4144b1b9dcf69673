//! Structure-function engine: validation, worker pool and assembly.
//!
//! A call validates its inputs, partitions the lag set into one contiguous
//! group per worker, runs every group on a dedicated pool of worker threads and
//! assembles the columns once all workers have joined. Workers share the signal
//! and order set read-only and write only to their own column block.
//!
//! The call is all-or-nothing. A failing worker records its error and raises a
//! cancellation flag that the remaining workers check before each lag; the first
//! recorded error is returned and the partially filled storage is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::assembler::{ColumnBlock, ResultAssembler, StructureFunctions};
use crate::config::{constants, EngineConfig, SummationMethod};
use crate::errors::{
    validate_all_finite, validate_allocation_size, validate_data_length, validate_lags,
    validate_orders, StructureFunctionError, StructureFunctionResult,
};
use crate::increments::IncrementAccumulator;
use crate::partition::{partition_lags, LagGroup};

/// Compute S(q, τ) for every order in `orders` and every lag in `lags`.
///
/// `worker_count = 0` uses all available hardware threads. Equivalent to
/// [`compute_with_config`] with [`EngineConfig::with_workers`].
///
/// # Example
/// ```rust
/// use structure_functions::compute;
///
/// let signal = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let sf = compute(&signal, &[1, 2], &[0.0, 2.0], 0).unwrap();
/// assert_eq!(sf.get(0, 0), Some(1.0));
/// assert_eq!(sf.get(1, 0), Some(1.0));
/// assert_eq!(sf.get(1, 1), Some(4.0));
/// ```
pub fn compute(
    signal: &[f64],
    lags: &[usize],
    orders: &[f64],
    worker_count: usize,
) -> StructureFunctionResult<StructureFunctions> {
    compute_with_config(signal, lags, orders, &EngineConfig::with_workers(worker_count))
}

/// Compute S(q, τ) with an explicit configuration.
pub fn compute_with_config(
    signal: &[f64],
    lags: &[usize],
    orders: &[f64],
    config: &EngineConfig,
) -> StructureFunctionResult<StructureFunctions> {
    validate_inputs(signal, lags, orders, config)?;

    let started = Instant::now();
    // Never spawn a worker with nothing to do.
    let workers = config.resolved_worker_count().min(lags.len());
    let groups = partition_lags(lags, workers)?;
    debug!(
        "structure functions: N = {}, {} lags, {} orders, {} workers",
        signal.len(),
        lags.len(),
        orders.len(),
        groups.len()
    );

    let mut assembler = ResultAssembler::new(orders.len(), lags.len());
    let blocks = assembler.column_blocks(&groups);
    run_workers(signal, orders, config, &groups, blocks)?;
    let result = assembler.finish(lags, orders, signal.len())?;

    if result.has_exclusions() {
        warn!("zero increments were excluded from negative-order moments; see excluded_fraction()");
    }
    debug!(
        "structure functions done in {:.3} ms",
        started.elapsed().as_secs_f64() * 1e3
    );
    Ok(result)
}

fn validate_inputs(
    signal: &[f64],
    lags: &[usize],
    orders: &[f64],
    config: &EngineConfig,
) -> StructureFunctionResult<()> {
    validate_data_length(signal, constants::MIN_SIGNAL_LENGTH)?;
    validate_all_finite(signal, "signal")?;
    validate_orders(orders)?;
    validate_lags(lags, signal.len())?;
    config.validate()?;
    validate_allocation_size(orders.len().saturating_mul(lags.len()))?;

    if config.summation == SummationMethod::Naive
        && signal.len() > constants::DEFAULT_COMPENSATION_THRESHOLD
    {
        warn!(
            "plain summation forced on {} samples; rounding error grows linearly with N",
            signal.len()
        );
    }
    Ok(())
}

/// Shared cancellation state of one call.
#[derive(Debug, Default)]
struct Cancellation {
    cancelled: AtomicBool,
    first_error: Mutex<Option<StructureFunctionError>>,
}

impl Cancellation {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn fail(&self, error: StructureFunctionError) {
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            debug!("cancelling remaining workers: {}", error);
            *slot = Some(error);
        }
        self.cancelled.store(true, Ordering::Release);
    }

    fn into_result(self) -> StructureFunctionResult<()> {
        match self.first_error.into_inner() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Body of one worker: accumulate and reduce every lag of its group in order.
fn run_group(
    signal: &[f64],
    orders: &[f64],
    config: &EngineConfig,
    group: &LagGroup,
    mut block: ColumnBlock<'_>,
    cancellation: &Cancellation,
) {
    let mut accumulator = IncrementAccumulator::new(signal, orders, config);
    for &unit in &group.units {
        if cancellation.is_cancelled() {
            return;
        }
        match accumulator.accumulate(unit) {
            Ok(_) => block.write_column(unit.lag_index, |values, excluded| {
                accumulator.write_column(values, excluded)
            }),
            Err(error) => {
                cancellation.fail(error);
                return;
            }
        }
    }
}

#[cfg(feature = "parallel")]
fn run_workers(
    signal: &[f64],
    orders: &[f64],
    config: &EngineConfig,
    groups: &[LagGroup],
    blocks: Vec<ColumnBlock<'_>>,
) -> StructureFunctionResult<()> {
    let cancellation = Cancellation::default();

    if groups.len() <= 1 {
        // A single worker runs on the calling thread.
        for (group, block) in groups.iter().zip(blocks) {
            run_group(signal, orders, config, group, block, &cancellation);
        }
        return cancellation.into_result();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(groups.len())
        .thread_name(|i| format!("structure-fn-worker-{}", i))
        .build()
        .map_err(|e| StructureFunctionError::ConcurrencyError {
            resource: format!("worker pool of {} threads: {}", groups.len(), e),
        })?;

    let cancellation_ref = &cancellation;
    pool.scope(|scope| {
        for (group, block) in groups.iter().zip(blocks) {
            scope.spawn(move |_| {
                run_group(signal, orders, config, group, block, cancellation_ref)
            });
        }
    });

    cancellation.into_result()
}

#[cfg(not(feature = "parallel"))]
fn run_workers(
    signal: &[f64],
    orders: &[f64],
    config: &EngineConfig,
    groups: &[LagGroup],
    blocks: Vec<ColumnBlock<'_>>,
) -> StructureFunctionResult<()> {
    // Sequential fallback when rayon is not available
    let cancellation = Cancellation::default();
    for (group, block) in groups.iter().zip(blocks) {
        run_group(signal, orders, config, group, block, &cancellation);
    }
    cancellation.into_result()
}
