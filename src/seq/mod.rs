pub mod layout;
pub mod linear;
pub mod packed;
pub mod pad;

pub use layout::{Layout, batch_first_to_time_first, time_first_to_batch_first};
pub use linear::{chunked_forward, pack_sequence_for_linear, unpack_sequence_for_linear};
pub use packed::*;
pub use pad::*;
