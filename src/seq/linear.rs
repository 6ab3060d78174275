//! Flattening padded batches into rows for position-wise layers.

use ndarray::{Array, Array2, ArrayView2, Axis, RemoveAxis, Slice, concatenate, stack};
use num_traits::Zero;
use tracing::{debug, trace};

use crate::{
    error::{Result, SeqError},
    seq::{
        layout::{Layout, check_lengths},
        pad::pad_1d,
    },
};

/// Concatenates the valid steps of a batch first `[B, T, ...]` array into
/// `[sum(lengths), ...]`, sequence after sequence.
pub fn pack_sequence_for_linear<A, D>(
    x: &Array<A, D>,
    lengths: &[usize],
    layout: Layout,
) -> Result<Array<A, D::Smaller>>
where
    A: Clone,
    D: RemoveAxis,
    D::Smaller: RemoveAxis,
{
    if !layout.is_batch_first() {
        return Err(SeqError::NotImplemented {
            op: "pack_sequence_for_linear",
            layout,
        });
    }

    assert!(
        x.ndim() >= 2,
        "attempted to pack rank {} array for linear",
        x.ndim()
    );

    check_lengths(lengths, x.len_of(Axis(0)), x.len_of(Axis(1)))?;

    let pieces = lengths
        .iter()
        .enumerate()
        .map(|(i, &l)| {
            let mut seq = x.index_axis(Axis(0), i);
            seq.slice_axis_inplace(Axis(0), Slice::from(0..l));
            seq
        })
        .collect::<Vec<_>>();

    Ok(concatenate(Axis(0), &pieces)?)
}

/// Inverse of [`pack_sequence_for_linear`]. `inputs` are row chunks of the
/// packed array, in order; they are joined, split per `lengths`, padded to
/// the longest length and stacked into `[B, T, ...]`.
pub fn unpack_sequence_for_linear<A, D>(
    inputs: &[Array<A, D>],
    lengths: &[usize],
    layout: Layout,
) -> Result<Array<A, D::Larger>>
where
    A: Clone + Zero,
    D: RemoveAxis,
    D::Larger: RemoveAxis,
{
    if !layout.is_batch_first() {
        return Err(SeqError::NotImplemented {
            op: "unpack_sequence_for_linear",
            layout,
        });
    }

    if inputs.is_empty() || lengths.is_empty() {
        return Err(SeqError::EmptyBatch);
    }

    let views = inputs.iter().map(|x| x.view()).collect::<Vec<_>>();
    let packed = concatenate(Axis(0), &views)?;

    let total = lengths.iter().sum::<usize>();
    if total != packed.len_of(Axis(0)) {
        return Err(SeqError::RowCount {
            expected: total,
            actual: packed.len_of(Axis(0)),
        });
    }

    let max_len = lengths.iter().copied().max().unwrap_or(0);
    let mut start = 0;
    let mut batch = Vec::with_capacity(lengths.len());

    for &l in lengths {
        let seq = packed
            .slice_axis(Axis(0), Slice::from(start..(start + l)))
            .to_owned();
        batch.push(pad_1d(&seq, max_len));
        start += l;
    }

    debug!(batch_size = lengths.len(), max_len, total, "unpacked rows for linear");

    let views = batch.iter().map(|x| x.view()).collect::<Vec<_>>();
    Ok(stack(Axis(0), &views)?)
}

/// Rows per chunk when splitting `n` rows into `chunks` pieces. Matches the
/// usual tensor chunking: `ceil(n / chunks)`, so fewer pieces may result.
pub(crate) fn chunk_len(n: usize, chunks: Option<usize>) -> usize {
    match chunks {
        Some(c) if c > 0 && n > 0 => n.div_ceil(c),
        _ => n.max(1),
    }
}

/// Applies `net` to `x` in row chunks and concatenates the results.
/// `None` or `Some(0)` applies it to the whole input at once.
pub fn chunked_forward<F>(x: &Array2<f64>, mut net: F, chunks: Option<usize>) -> Result<Array2<f64>>
where
    F: FnMut(ArrayView2<f64>) -> Array2<f64>,
{
    let rows = x.nrows();
    if rows == 0 || !matches!(chunks, Some(c) if c > 0) {
        return Ok(net(x.view()));
    }

    let size = chunk_len(rows, chunks);
    let outputs = x
        .axis_chunks_iter(Axis(0), size)
        .enumerate()
        .map(|(i, chunk)| {
            trace!(chunk = i, rows = chunk.nrows(), "chunked forward");
            net(chunk)
        })
        .collect::<Vec<_>>();

    let views = outputs.iter().map(|o| o.view()).collect::<Vec<_>>();
    Ok(concatenate(Axis(0), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_len_rounds_up() {
        assert_eq!(chunk_len(10, Some(3)), 4);
        assert_eq!(chunk_len(9, Some(3)), 3);
        assert_eq!(chunk_len(2, Some(5)), 1);
        assert_eq!(chunk_len(7, None), 7);
        assert_eq!(chunk_len(7, Some(0)), 7);
        assert_eq!(chunk_len(0, Some(2)), 1);
    }
}
