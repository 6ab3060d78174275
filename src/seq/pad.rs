use ndarray::{Array, Array2, Array3, ArrayView1, Axis, RemoveAxis, Slice, stack};
use num_traits::Zero;

use crate::{
    error::{Result, SeqError},
    seq::layout::Layout,
};

/// Zero-pads `x` along axis 0 up to `len`. Longer inputs are returned as is.
pub fn pad_1d<A, D>(x: &Array<A, D>, len: usize) -> Array<A, D>
where
    A: Clone + Zero,
    D: RemoveAxis,
{
    pad_axis(x, Axis(0), len)
}

/// Zero-pads the time axis of `x` up to `len`, never truncating.
///
/// `x` is `[B, T, ...]` when batch first, `[T, B, ...]` otherwise.
pub fn pad<A, D>(x: &Array<A, D>, len: usize, layout: Layout) -> Array<A, D>
where
    A: Clone + Zero,
    D: RemoveAxis,
{
    pad_axis(x, Axis(layout.time_axis()), len)
}

fn pad_axis<A, D>(x: &Array<A, D>, axis: Axis, len: usize) -> Array<A, D>
where
    A: Clone + Zero,
    D: RemoveAxis,
{
    assert!(
        axis.index() < x.ndim(),
        "attempted to pad axis {} of rank {} array",
        axis.index(),
        x.ndim()
    );

    let current = x.len_of(axis);
    if len <= current {
        return x.to_owned();
    }

    let mut shape = x.raw_dim();
    shape[axis.index()] = len;

    let mut padded = Array::zeros(shape);
    padded
        .slice_axis_mut(axis, Slice::from(0..current))
        .assign(x);
    padded
}

/// Pads each `[T_i, ...]` sequence to the longest length and stacks them
/// along the batch axis, producing `[B, T, ...]` or `[T, B, ...]`.
pub fn pad_list_sequence<A, D>(
    inputs: &[Array<A, D>],
    lengths: &[usize],
    layout: Layout,
) -> Result<Array<A, D::Larger>>
where
    A: Clone + Zero,
    D: RemoveAxis,
    D::Larger: RemoveAxis,
{
    if inputs.is_empty() {
        return Err(SeqError::EmptyBatch);
    }

    if lengths.len() != inputs.len() {
        return Err(SeqError::LengthCount {
            expected: inputs.len(),
            actual: lengths.len(),
        });
    }

    let max_len = lengths.iter().copied().max().unwrap_or(0);
    let padded = inputs
        .iter()
        .map(|x| pad_1d(x, max_len))
        .collect::<Vec<_>>();
    let views = padded.iter().map(|x| x.view()).collect::<Vec<_>>();

    Ok(stack(Axis(layout.batch_axis()), &views)?)
}

/// `[B, max_len]` mask holding 1.0 on the valid steps of each sequence.
pub fn length_mask(lengths: &[usize], max_len: usize) -> Array2<f64> {
    let mut mask = Array2::zeros((lengths.len(), max_len));

    for (i, &l) in lengths.iter().enumerate() {
        mask.slice_mut(ndarray::s![i, 0..l.min(max_len)]).fill(1.0);
    }

    mask
}

/// Number of leading non-zero entries in each mask row.
pub fn lengths_from_mask(mask: &Array2<f64>) -> Vec<usize> {
    mask.axis_iter(Axis(0))
        .map(|row: ArrayView1<f64>| row.iter().take_while(|&&m| m != 0.).count())
        .collect()
}

/// Stacks a ragged batch of `[T_i, D]` sequences batch first alongside its
/// `[B, T]` validity mask.
pub fn batch_with_mask(x: Vec<Array2<f64>>) -> (Array3<f64>, Array2<f64>) {
    let batch_size = x.len();
    let max_seq_len = x.iter().map(|x| x.dim().0).max().unwrap_or(0);
    let features = x.first().map(|x| x.dim().1).unwrap_or(0);

    let mut x3 = Array3::zeros((batch_size, max_seq_len, features));

    for (i, row) in x.iter().enumerate() {
        x3.slice_mut(ndarray::s![i, 0..row.dim().0, ..]).assign(row);
    }

    let lengths = x.iter().map(|x| x.dim().0).collect::<Vec<_>>();

    (x3, length_mask(&lengths, max_seq_len))
}
