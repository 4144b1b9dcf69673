//! Result matrix ownership and assembly.
//!
//! The assembler owns the output storage for one call. Storage is column-major
//! so that each lag's column of orders is a contiguous slice; workers receive
//! exclusive [`ColumnBlock`]s split off the storage, one per lag group, and the
//! assembler checks that every column was written exactly once before handing
//! the matrix to the caller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{StructureFunctionError, StructureFunctionResult};
use crate::partition::LagGroup;

/// Dense |orders| × |lags| matrix of structure-function values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResultMatrix {
    n_orders: usize,
    n_lags: usize,
    /// Column-major: entry (i, j) at `j * n_orders + i`
    data: Vec<f64>,
}

impl ResultMatrix {
    pub(crate) fn from_column_major(n_orders: usize, n_lags: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), n_orders * n_lags);
        Self {
            n_orders,
            n_lags,
            data,
        }
    }

    /// (number of orders, number of lags)
    pub fn shape(&self) -> (usize, usize) {
        (self.n_orders, self.n_lags)
    }

    /// Entry (order_index, lag_index), or `None` when out of bounds.
    pub fn get(&self, order_index: usize, lag_index: usize) -> Option<f64> {
        if order_index >= self.n_orders || lag_index >= self.n_lags {
            return None;
        }
        Some(self.data[lag_index * self.n_orders + order_index])
    }

    /// All orders at one lag, or `None` when out of bounds.
    pub fn column(&self, lag_index: usize) -> Option<&[f64]> {
        if lag_index >= self.n_lags {
            return None;
        }
        let start = lag_index * self.n_orders;
        Some(&self.data[start..start + self.n_orders])
    }

    /// One order across all lags, or `None` when out of bounds.
    pub fn row(&self, order_index: usize) -> Option<Vec<f64>> {
        if order_index >= self.n_orders {
            return None;
        }
        Some(self.row_unchecked(order_index))
    }

    fn row_unchecked(&self, order_index: usize) -> Vec<f64> {
        self.data
            .iter()
            .skip(order_index)
            .step_by(self.n_orders)
            .copied()
            .collect()
    }

    /// Row-major copy, one inner vector per order.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_orders).map(|i| self.row_unchecked(i)).collect()
    }

    /// Raw column-major storage.
    pub fn as_column_major(&self) -> &[f64] {
        &self.data
    }

    /// Element-wise transform into a new matrix of the same shape.
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> ResultMatrix {
        ResultMatrix {
            n_orders: self.n_orders,
            n_lags: self.n_lags,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Output of a `compute` call: the matrix plus echoes of its index sets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StructureFunctions {
    values: ResultMatrix,
    /// Column-major zero-increment exclusion counts, same layout as `values`
    excluded: Vec<usize>,
    lags: Vec<usize>,
    orders: Vec<f64>,
    signal_length: usize,
}

impl StructureFunctions {
    /// The |orders| × |lags| matrix.
    pub fn values(&self) -> &ResultMatrix {
        &self.values
    }

    /// S(q_i, τ_j), or `None` when out of bounds.
    pub fn get(&self, order_index: usize, lag_index: usize) -> Option<f64> {
        self.values.get(order_index, lag_index)
    }

    /// S(q_i, ·) across all lags, or `None` when out of bounds.
    pub fn row(&self, order_index: usize) -> Option<Vec<f64>> {
        self.values.row(order_index)
    }

    /// S(·, τ_j) across all orders, or `None` when out of bounds.
    pub fn column(&self, lag_index: usize) -> Option<&[f64]> {
        self.values.column(lag_index)
    }

    /// Lag set echo, in caller order.
    pub fn lags(&self) -> &[usize] {
        &self.lags
    }

    /// Order set echo, in caller order.
    pub fn orders(&self) -> &[f64] {
        &self.orders
    }

    /// Length of the analysed signal.
    pub fn signal_length(&self) -> usize {
        self.signal_length
    }

    /// (number of orders, number of lags)
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// log2 S(q, τ) for every cell.
    pub fn log2_values(&self) -> ResultMatrix {
        self.values.map(f64::log2)
    }

    /// Zero increments left out of cell (i, j); always 0 under the rejecting policy.
    pub fn excluded_count(&self, order_index: usize, lag_index: usize) -> Option<usize> {
        let (n_orders, n_lags) = self.shape();
        if order_index >= n_orders || lag_index >= n_lags {
            return None;
        }
        Some(self.excluded[lag_index * n_orders + order_index])
    }

    /// Excluded zero increments of cell (i, j) as a fraction of N - τ_j.
    pub fn excluded_fraction(&self, order_index: usize, lag_index: usize) -> Option<f64> {
        let count = self.excluded_count(order_index, lag_index)?;
        let increments = self.signal_length - self.lags[lag_index];
        Some(count as f64 / increments as f64)
    }

    /// True when any cell excluded zero increments.
    pub fn has_exclusions(&self) -> bool {
        self.excluded.iter().any(|&c| c > 0)
    }

    /// Take ownership of the matrix, dropping the echoes.
    pub fn into_matrix(self) -> ResultMatrix {
        self.values
    }
}

/// Exclusive write access to a contiguous run of result columns.
#[derive(Debug)]
pub struct ColumnBlock<'a> {
    start: usize,
    n_orders: usize,
    values: &'a mut [f64],
    excluded: &'a mut [usize],
    writes: &'a mut [usize],
}

impl<'a> ColumnBlock<'a> {
    /// First lag index covered by the block.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of columns in the block.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True for a block with no columns.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Hand column `lag_index` (global index) to `write` and record the write.
    pub fn write_column<F>(&mut self, lag_index: usize, write: F)
    where
        F: FnOnce(&mut [f64], &mut [usize]),
    {
        let local = lag_index - self.start;
        let range = local * self.n_orders..(local + 1) * self.n_orders;
        write(&mut self.values[range.clone()], &mut self.excluded[range]);
        self.writes[local] += 1;
    }
}

/// Owner of one call's output storage.
#[derive(Debug)]
pub struct ResultAssembler {
    n_orders: usize,
    n_lags: usize,
    values: Vec<f64>,
    excluded: Vec<usize>,
    writes: Vec<usize>,
}

impl ResultAssembler {
    /// Storage for `n_orders` × `n_lags` cells, every cell unwritten.
    pub fn new(n_orders: usize, n_lags: usize) -> Self {
        let cells = n_orders * n_lags;
        Self {
            n_orders,
            n_lags,
            values: vec![f64::NAN; cells],
            excluded: vec![0; cells],
            writes: vec![0; n_lags],
        }
    }

    /// Split the storage into one exclusive block per group.
    ///
    /// Groups must be contiguous and ordered, as produced by
    /// [`crate::partition::partition_lags`].
    pub fn column_blocks(&mut self, groups: &[LagGroup]) -> Vec<ColumnBlock<'_>> {
        let n_orders = self.n_orders;
        let mut values: &mut [f64] = &mut self.values;
        let mut excluded: &mut [usize] = &mut self.excluded;
        let mut writes: &mut [usize] = &mut self.writes;

        let mut blocks = Vec::with_capacity(groups.len());
        for group in groups {
            let cells = group.len() * n_orders;
            let (v_head, v_tail) = std::mem::take(&mut values).split_at_mut(cells);
            let (e_head, e_tail) = std::mem::take(&mut excluded).split_at_mut(cells);
            let (w_head, w_tail) = std::mem::take(&mut writes).split_at_mut(group.len());
            values = v_tail;
            excluded = e_tail;
            writes = w_tail;

            blocks.push(ColumnBlock {
                start: group.start,
                n_orders,
                values: v_head,
                excluded: e_head,
                writes: w_head,
            });
        }
        blocks
    }

    /// Check that every column was written exactly once and build the output.
    pub fn finish(
        self,
        lags: &[usize],
        orders: &[f64],
        signal_length: usize,
    ) -> StructureFunctionResult<StructureFunctions> {
        if let Some((lag_index, &writes)) =
            self.writes.iter().enumerate().find(|(_, &w)| w != 1)
        {
            return Err(StructureFunctionError::IncompleteResult { lag_index, writes });
        }
        debug_assert_eq!(lags.len(), self.n_lags);
        debug_assert_eq!(orders.len(), self.n_orders);

        Ok(StructureFunctions {
            values: ResultMatrix {
                n_orders: self.n_orders,
                n_lags: self.n_lags,
                data: self.values,
            },
            excluded: self.excluded,
            lags: lags.to_vec(),
            orders: orders.to_vec(),
            signal_length,
        })
    }
}
