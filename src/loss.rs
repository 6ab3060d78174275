use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::trace;

use crate::{
    error::{Result, SeqError},
    f,
    seq::{Layout, linear::chunk_len, pack_sequence_for_linear},
};

/// Cross entropy over variable-length label sequences, averaged over the
/// `sum(lengths)` valid positions.
///
/// `logits` is `[sum(lengths), V]` in the row order produced by
/// [`pack_sequence_for_linear`]; `labels` is `[B, T]` batch first. With
/// `chunks`, the per-row losses are summed chunk by chunk, which bounds the
/// size of the intermediate log-probabilities without changing the result.
pub fn seq2seq_cross_entropy(
    logits: &Array2<f64>,
    labels: &Array2<usize>,
    lengths: &[usize],
    chunks: Option<usize>,
) -> Result<f64> {
    let packed_labels = packed_targets(logits, labels, lengths)?;
    let total = packed_labels.len();

    let size = chunk_len(total, chunks);
    let mut loss = 0.;

    for (i, (x, y)) in logits
        .axis_chunks_iter(Axis(0), size)
        .zip(packed_labels.axis_chunks_iter(Axis(0), size))
        .enumerate()
    {
        let chunk_loss = cross_entropy_sum(x, y);
        trace!(chunk = i, rows = x.nrows(), chunk_loss, "cross entropy chunk");
        loss += chunk_loss;
    }

    Ok(loss / total as f64)
}

/// Gradient of [`seq2seq_cross_entropy`] with respect to `logits`:
/// `(softmax(logits) - one_hot(labels)) / sum(lengths)`.
pub fn d_seq2seq_cross_entropy(
    logits: &Array2<f64>,
    labels: &Array2<usize>,
    lengths: &[usize],
) -> Result<Array2<f64>> {
    let packed_labels = packed_targets(logits, labels, lengths)?;
    let total = packed_labels.len() as f64;

    let mut grad = f::softmax(logits.view());
    for (row, &label) in packed_labels.iter().enumerate() {
        grad[[row, label]] -= 1.;
    }

    Ok(grad / total)
}

fn packed_targets(
    logits: &Array2<f64>,
    labels: &Array2<usize>,
    lengths: &[usize],
) -> Result<Array1<usize>> {
    let packed_labels = pack_sequence_for_linear(labels, lengths, Layout::BatchFirst)?;

    if packed_labels.is_empty() {
        return Err(SeqError::EmptyBatch);
    }

    if packed_labels.len() != logits.nrows() {
        return Err(SeqError::RowCount {
            expected: packed_labels.len(),
            actual: logits.nrows(),
        });
    }

    let classes = logits.ncols();
    if let Some((row, &label)) = packed_labels.iter().enumerate().find(|(_, l)| **l >= classes) {
        return Err(SeqError::LabelOutOfRange {
            row,
            label,
            classes,
        });
    }

    Ok(packed_labels)
}

fn cross_entropy_sum(logits: ArrayView2<f64>, labels: ArrayView1<usize>) -> f64 {
    let log_probs = f::log_softmax(logits);

    labels
        .iter()
        .enumerate()
        .map(|(row, &label)| -log_probs[[row, label]])
        .sum()
}
