//! # Activation Functions Module
//!
//! Elementwise nonlinearities used between the affine layers of the networks.
//!
//! Every activation comes as a forward/backward pair: the forward returns its
//! output together with a cache, and the backward consumes that cache exactly
//! once to turn an upstream gradient into a gradient w.r.t. the input.
//!
//! ## Usage Example
//!
//! ```rust
//! use fcnet::activations::{relu_backward, relu_forward};
//! use ndarray::{array, Array2};
//!
//! let x: Array2<f64> = array![[1.0, -0.5], [0.0, 2.0]];
//! let (out, cache) = relu_forward(&x);
//! assert_eq!(out, array![[1.0, 0.0], [0.0, 2.0]]);
//!
//! let dx = relu_backward(&array![[1.0, 1.0], [1.0, 1.0]], cache);
//! assert_eq!(dx, array![[1.0, 0.0], [0.0, 1.0]]);
//! ```

pub mod relu;

pub use relu::{relu_backward, relu_forward, ReluCache};
