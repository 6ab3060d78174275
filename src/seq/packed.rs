//! Packed sequences: a padded batch compacted time step by time step.
//!
//! For a batch sorted by decreasing length, step `t` holds the rows of the
//! `batch_sizes[t]` sequences still running at `t`. Recurrent layers walk
//! the steps in order and only ever touch active rows, so padding never
//! reaches the state.

use std::cmp::Reverse;

use ndarray::{Array2, Array3, ArrayView3, Axis, s};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Result, SeqError},
    seq::layout::{Layout, batch_first_to_time_first, check_lengths, check_non_empty},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "PackedSequenceParts")]
pub struct PackedSequence {
    data: Array2<f64>,
    batch_sizes: Vec<usize>,
}

/// Unchecked wire form. Deserialization goes through [`PackedSequence::new`].
#[derive(Deserialize)]
struct PackedSequenceParts {
    data: Array2<f64>,
    batch_sizes: Vec<usize>,
}

impl TryFrom<PackedSequenceParts> for PackedSequence {
    type Error = SeqError;

    fn try_from(parts: PackedSequenceParts) -> Result<Self> {
        Self::new(parts.data, parts.batch_sizes)
    }
}

impl PackedSequence {
    /// Builds a packed sequence from raw parts, checking that `batch_sizes`
    /// is non-increasing and accounts for every row of `data`.
    pub fn new(data: Array2<f64>, batch_sizes: Vec<usize>) -> Result<Self> {
        if batch_sizes.windows(2).any(|w| w[0] < w[1]) || batch_sizes.contains(&0) {
            return Err(SeqError::BatchSizes { batch_sizes });
        }

        let total = batch_sizes.iter().sum::<usize>();
        if total != data.nrows() {
            return Err(SeqError::RowCount {
                expected: total,
                actual: data.nrows(),
            });
        }

        Ok(Self { data, batch_sizes })
    }

    /// Same step structure, different rows. Used to chain recurrent layers.
    pub(crate) fn with_data(&self, data: Array2<f64>) -> Self {
        assert!(
            data.nrows() == self.data.nrows(),
            "packed data has {} rows, expected {}",
            data.nrows(),
            self.data.nrows()
        );

        Self {
            data,
            batch_sizes: self.batch_sizes.clone(),
        }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    pub fn batch_size(&self) -> usize {
        self.batch_sizes.first().copied().unwrap_or(0)
    }

    pub fn max_len(&self) -> usize {
        self.batch_sizes.len()
    }

    pub fn features(&self) -> usize {
        self.data.ncols()
    }

    /// Length of each packed sequence, in packed (decreasing length) order.
    pub fn lengths(&self) -> Vec<usize> {
        (0..self.batch_size())
            .map(|b| self.batch_sizes.iter().filter(|&&n| n > b).count())
            .collect()
    }

    /// First row of each time step within `data`.
    pub fn offsets(&self) -> Vec<usize> {
        self.batch_sizes
            .iter()
            .scan(0, |offset, &n| {
                let start = *offset;
                *offset += n;
                Some(start)
            })
            .collect()
    }
}

fn batch_first_view(x: &Array3<f64>, layout: Layout) -> ArrayView3<'_, f64> {
    let mut view = x.view();
    if !layout.is_batch_first() {
        view.swap_axes(0, 1);
    }
    view
}

/// Packs a padded batch whose lengths are already sorted in non-increasing
/// order. `x` is `[B, T, D]` when batch first, `[T, B, D]` otherwise.
pub fn pack_padded_sequence(
    x: &Array3<f64>,
    lengths: &[usize],
    layout: Layout,
) -> Result<PackedSequence> {
    pack_view(batch_first_view(x, layout), lengths)
}

fn pack_view(x: ArrayView3<f64>, lengths: &[usize]) -> Result<PackedSequence> {
    let (batch_size, seq_len, features) = x.dim();

    check_lengths(lengths, batch_size, seq_len)?;
    check_non_empty(lengths)?;

    if lengths.windows(2).any(|w| w[0] < w[1]) {
        return Err(SeqError::UnsortedLengths {
            lengths: lengths.to_vec(),
        });
    }

    let max_len = lengths[0];
    let batch_sizes = (0..max_len)
        .map(|t| lengths.iter().take_while(|&&l| l > t).count())
        .collect::<Vec<_>>();
    let total = batch_sizes.iter().sum::<usize>();

    let mut data = Array2::zeros((total, features));
    let mut row = 0;

    for (t, &n) in batch_sizes.iter().enumerate() {
        data.slice_mut(s![row..(row + n), ..])
            .assign(&x.slice(s![0..n, t, ..]));
        row += n;
    }

    debug!(batch_size, max_len, total, "packed padded batch");

    PackedSequence::new(data, batch_sizes)
}

/// Inverse of [`pack_padded_sequence`]. Steps past each sequence's length
/// are zero. Returns the padded batch and the packed lengths.
pub fn pad_packed_sequence(packed: &PackedSequence, layout: Layout) -> (Array3<f64>, Vec<usize>) {
    let batch_size = packed.batch_size();
    let max_len = packed.max_len();

    let mut padded = Array3::zeros((batch_size, max_len, packed.features()));
    let mut row = 0;

    for (t, &n) in packed.batch_sizes().iter().enumerate() {
        padded
            .slice_mut(s![0..n, t, ..])
            .assign(&packed.data().slice(s![row..(row + n), ..]));
        row += n;
    }

    debug!(batch_size, max_len, "padded packed batch");

    let padded = match layout {
        Layout::BatchFirst => padded,
        Layout::TimeFirst => batch_first_to_time_first(&padded),
    };

    (padded, packed.lengths())
}

/// Sorts the batch by decreasing length and packs it for a recurrent layer.
///
/// Ties keep their batch order. `reverse_indices[i]` is the packed position
/// of batch element `i`; hand it to [`unpack_from_rnn_seq`] to restore order.
pub fn pack_for_rnn_seq(
    x: &Array3<f64>,
    lengths: &[usize],
    layout: Layout,
) -> Result<(PackedSequence, Vec<usize>)> {
    let view = batch_first_view(x, layout);
    let (batch_size, seq_len, _) = view.dim();

    check_lengths(lengths, batch_size, seq_len)?;
    check_non_empty(lengths)?;

    let mut order = (0..batch_size).collect::<Vec<_>>();
    order.sort_by_key(|&i| Reverse(lengths[i]));

    let mut reverse_indices = vec![0; batch_size];
    for (j, &i) in order.iter().enumerate() {
        reverse_indices[i] = j;
    }

    let sorted = view.select(Axis(0), &order);
    let sorted_lengths = order.iter().map(|&i| lengths[i]).collect::<Vec<_>>();

    debug!(?order, "sorted batch by decreasing length");

    let packed = pack_view(sorted.view(), &sorted_lengths)?;
    Ok((packed, reverse_indices))
}

/// Pads a packed recurrent output back out and restores the batch order
/// recorded by [`pack_for_rnn_seq`].
pub fn unpack_from_rnn_seq(
    packed: &PackedSequence,
    reverse_indices: &[usize],
    layout: Layout,
) -> Result<Array3<f64>> {
    let batch_size = packed.batch_size();

    let mut seen = vec![false; batch_size];
    let is_permutation = reverse_indices.len() == batch_size
        && reverse_indices
            .iter()
            .all(|&i| i < batch_size && !std::mem::replace(&mut seen[i], true));

    if !is_permutation {
        return Err(SeqError::ReverseIndices {
            indices: reverse_indices.to_vec(),
            batch_size,
        });
    }

    let (padded, _) = pad_packed_sequence(packed, Layout::BatchFirst);
    let restored = padded.select(Axis(0), reverse_indices);

    Ok(match layout {
        Layout::BatchFirst => restored,
        Layout::TimeFirst => batch_first_to_time_first(&restored),
    })
}
