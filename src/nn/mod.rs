pub mod lstm;
pub mod pooling;
pub mod rnn;

pub use lstm::*;
pub use pooling::*;
pub use rnn::*;
