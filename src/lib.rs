pub mod error;
pub mod f;
pub mod loss;
pub mod nn;
pub mod seq;

pub use error::{Result, SeqError};

pub use ndarray;
pub use ndarray_rand;
