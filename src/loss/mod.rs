//! Classification losses.

pub mod functions;

pub use functions::softmax_loss;
