//! Task partitioning of the lag set across workers.
//!
//! Lags are split into contiguous, balanced groups: group sizes differ by at
//! most one and no lag index appears in two groups. Contiguity lets the result
//! matrix be split into one exclusive column block per group.

use crate::errors::{StructureFunctionError, StructureFunctionResult};

/// One lag assigned to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkUnit {
    /// Position of the lag in the caller's lag set (result column)
    pub lag_index: usize,
    /// Lag value τ
    pub lag: usize,
}

/// Contiguous run of work units owned by a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagGroup {
    /// Index of the first lag in the group
    pub start: usize,
    /// Work units in lag-index order
    pub units: Vec<WorkUnit>,
}

impl LagGroup {
    /// Number of lags in the group.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when the group holds no lags.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// One past the last lag index of the group.
    pub fn end(&self) -> usize {
        self.start + self.units.len()
    }
}

/// Partition `lags` into `workers` balanced contiguous groups.
///
/// `workers` below 1 is clamped to 1. When there are more workers than lags
/// the trailing groups are empty.
///
/// # Example
/// ```rust
/// use structure_functions::partition::partition_lags;
///
/// let groups = partition_lags(&[1, 2, 4, 8, 16], 2).unwrap();
/// assert_eq!(groups[0].len(), 3);
/// assert_eq!(groups[1].len(), 2);
/// assert_eq!(groups[1].start, 3);
/// ```
pub fn partition_lags(lags: &[usize], workers: usize) -> StructureFunctionResult<Vec<LagGroup>> {
    if lags.is_empty() {
        return Err(StructureFunctionError::invalid("lags", "must not be empty"));
    }

    let workers = workers.max(1);
    let base = lags.len() / workers;
    let remainder = lags.len() % workers;

    let mut groups = Vec::with_capacity(workers);
    let mut start = 0;
    for worker in 0..workers {
        // The first `remainder` groups take one extra lag.
        let size = base + usize::from(worker < remainder);
        let units = lags[start..start + size]
            .iter()
            .enumerate()
            .map(|(offset, &lag)| WorkUnit {
                lag_index: start + offset,
                lag,
            })
            .collect();
        groups.push(LagGroup { start, units });
        start += size;
    }

    debug_assert_eq!(start, lags.len());
    Ok(groups)
}
