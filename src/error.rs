use ndarray::ShapeError;
use thiserror::Error;

use crate::seq::Layout;

#[derive(Debug, Error)]
pub enum SeqError {
    /// Operation has no implementation for the given layout.
    #[error("{op} is not implemented for {layout:?} input")]
    NotImplemented { op: &'static str, layout: Layout },

    #[error("expected {expected} lengths, got {actual}")]
    LengthCount { expected: usize, actual: usize },

    #[error("cannot operate on an empty batch")]
    EmptyBatch,

    #[error("sequence {index} has length 0")]
    EmptySequence { index: usize },

    #[error("sequence {index} has length {length} but time dimension is {max}")]
    LengthOutOfRange {
        index: usize,
        length: usize,
        max: usize,
    },

    #[error("lengths must be sorted in non-increasing order, got {lengths:?}")]
    UnsortedLengths { lengths: Vec<usize> },

    #[error("batch sizes must be non-zero and non-increasing, got {batch_sizes:?}")]
    BatchSizes { batch_sizes: Vec<usize> },

    #[error("expected {expected} rows, got {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("label {label} at row {row} is out of range for {classes} classes")]
    LabelOutOfRange {
        row: usize,
        label: usize,
        classes: usize,
    },

    #[error("reverse indices {indices:?} are not a permutation of 0..{batch_size}")]
    ReverseIndices {
        indices: Vec<usize>,
        batch_size: usize,
    },

    #[error("expected state of shape {expected:?}, got {actual:?}")]
    StateShape {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

pub type Result<T> = std::result::Result<T, SeqError>;
