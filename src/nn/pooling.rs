use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, s, stack};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SeqError},
    seq::layout::{check_lengths, check_non_empty},
};

/// Max over the valid steps of each sequence of a batch first `[B, T, D]`
/// array, giving `[B, D]`. NaNs are skipped unless a column is all NaN.
pub fn max_along_time(x: &Array3<f64>, lengths: &[usize]) -> Result<Array2<f64>> {
    let (batch_size, seq_len, features) = x.dim();

    check_lengths(lengths, batch_size, seq_len)?;
    check_non_empty(lengths)?;

    let mut pooled = Array2::zeros((batch_size, features));
    for (i, &l) in lengths.iter().enumerate() {
        pooled
            .row_mut(i)
            .assign(&column_max(x.slice(s![i, 0..l, ..])));
    }

    Ok(pooled)
}

/// [`max_along_time`] over a list of `[T_i, D]` sequences.
pub fn max_along_time_list(seqs: &[Array2<f64>]) -> Result<Array2<f64>> {
    if seqs.is_empty() {
        return Err(SeqError::EmptyBatch);
    }

    let lengths = seqs.iter().map(|x| x.nrows()).collect::<Vec<_>>();
    check_non_empty(&lengths)?;

    let pooled = seqs
        .iter()
        .map(|x| column_max(x.view()))
        .collect::<Vec<_>>();
    let views = pooled.iter().map(|p| p.view()).collect::<Vec<_>>();

    Ok(stack(Axis(0), &views)?)
}

fn column_max(x: ArrayView2<f64>) -> Array1<f64> {
    x.map_axis(Axis(0), |col| *col.max_skipnan())
}

/// Max pooling over time as a layer. The forward pass remembers which step
/// won each `(batch, feature)` so the backward pass can route gradients to it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MaxAlongTime {
    pub d_time: usize,

    #[serde(skip)]
    argmax: Array2<usize>,
}

impl MaxAlongTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: Array3<f64>, lengths: &[usize], grad: bool) -> Result<Array2<f64>> {
        let (batch_size, seq_len, features) = x.dim();

        check_lengths(lengths, batch_size, seq_len)?;
        check_non_empty(lengths)?;

        let mut argmax = Array2::zeros((batch_size, features));
        let mut pooled = Array2::zeros((batch_size, features));

        for (i, &l) in lengths.iter().enumerate() {
            let seq = x.slice(s![i, 0..l, ..]);
            for (j, col) in seq.axis_iter(Axis(1)).enumerate() {
                let t = col.argmax_skipnan().unwrap_or(0);
                argmax[[i, j]] = t;
                pooled[[i, j]] = col[t];
            }
        }

        if grad {
            self.d_time = seq_len;
            self.argmax = argmax;
        }

        Ok(pooled)
    }

    pub fn backward(&mut self, d_loss: Array2<f64>) -> Array3<f64> {
        let (batch_size, features) = d_loss.dim();

        assert!(
            self.argmax.dim() == d_loss.dim(),
            "dimension mismatch, cached={:?} d_loss={:?}",
            self.argmax.dim(),
            d_loss.dim()
        );

        let mut d_x = Array3::zeros((batch_size, self.d_time, features));
        for ((i, j), &t) in self.argmax.indexed_iter() {
            d_x[[i, t, j]] = d_loss[[i, j]];
        }

        d_x
    }
}
