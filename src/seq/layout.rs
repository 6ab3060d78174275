use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqError};

/// Axis order of a sequence batch.
///
/// `BatchFirst` is `[B, T, ...]`, `TimeFirst` is `[T, B, ...]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    BatchFirst,
    TimeFirst,
}

impl Layout {
    pub fn from_batch_first(batch_first: bool) -> Self {
        if batch_first {
            Self::BatchFirst
        } else {
            Self::TimeFirst
        }
    }

    pub fn is_batch_first(&self) -> bool {
        matches!(self, Self::BatchFirst)
    }

    pub fn time_axis(&self) -> usize {
        match self {
            Self::BatchFirst => 1,
            Self::TimeFirst => 0,
        }
    }

    pub fn batch_axis(&self) -> usize {
        match self {
            Self::BatchFirst => 0,
            Self::TimeFirst => 1,
        }
    }
}

/// [B, T, ...] -> [T, B, ...]
pub fn batch_first_to_time_first<A: Clone, D: Dimension>(x: &Array<A, D>) -> Array<A, D> {
    swap_batch_time(x)
}

/// [T, B, ...] -> [B, T, ...]
pub fn time_first_to_batch_first<A: Clone, D: Dimension>(x: &Array<A, D>) -> Array<A, D> {
    swap_batch_time(x)
}

fn swap_batch_time<A: Clone, D: Dimension>(x: &Array<A, D>) -> Array<A, D> {
    assert!(
        x.ndim() >= 2,
        "attempted to swap batch and time axes of rank {} array",
        x.ndim()
    );

    let mut view = x.view();
    view.swap_axes(0, 1);
    view.as_standard_layout().into_owned()
}

/// One length per batch element, none longer than `max_len`.
pub(crate) fn check_lengths(lengths: &[usize], batch_size: usize, max_len: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(SeqError::EmptyBatch);
    }

    if lengths.len() != batch_size {
        return Err(SeqError::LengthCount {
            expected: batch_size,
            actual: lengths.len(),
        });
    }

    for (index, &length) in lengths.iter().enumerate() {
        if length > max_len {
            return Err(SeqError::LengthOutOfRange {
                index,
                length,
                max: max_len,
            });
        }
    }

    Ok(())
}

pub(crate) fn check_non_empty(lengths: &[usize]) -> Result<()> {
    match lengths.iter().position(|&l| l == 0) {
        Some(index) => Err(SeqError::EmptySequence { index }),
        None => Ok(()),
    }
}
