//! # fcnet - Fully-Connected Classifier Networks
//!
//! fcnet assembles affine, ReLU, batch normalization and dropout primitives
//! into feed-forward classifiers that compute class scores and, given labels,
//! a softmax cross-entropy loss with L2 regularization plus the gradient of
//! that loss for every learnable parameter. Parameter updates are left to an
//! external optimizer, which reads gradients and writes parameters through a
//! name-keyed [`ParamStore`](network::ParamStore).
//!
//! ## Key Features
//!
//! - **TwoLayerNet**: `affine -> relu -> affine -> softmax`
//! - **FullyConnectedNet**: any depth, optional batch normalization and dropout
//! - **Precision**: every model is generic over `f32` / `f64`
//! - **Gradient checking**: central-difference checks against the analytic gradients
//! - **Persistence**: bincode save/load including batch normalization statistics
//!
//! ## Quick Start
//!
//! ```rust
//! use fcnet::network::{Classifier, FullyConnectedNet};
//! use ndarray::Array2;
//!
//! let mut net = FullyConnectedNet::<f64>::builder(&[16, 16])
//!     .input_dim(8)
//!     .num_classes(3)
//!     .batchnorm(true)
//!     .reg(0.01)
//!     .build()
//!     .unwrap();
//!
//! let x = Array2::<f64>::ones((4, 8));
//! let y = [0, 1, 2, 1];
//!
//! let (loss, grads) = net.train_loss(&x, &y).unwrap();
//! assert!(loss > 0.0);
//! assert_eq!(grads.names(), net.params().names());
//!
//! // Plain SGD step through the optimizer-facing view
//! net.params_mut().zip_mut_with(&grads, |p, &g| *p -= 0.1 * g).unwrap();
//!
//! let scores = net.scores(&x).unwrap();
//! assert_eq!(scores.dim(), (4, 3));
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - ReLU forward/backward
//! - [`builders`] - Builder for fully-connected networks
//! - [`debug`] - Numerical gradient checks and gradient inspection
//! - [`error`] - Error types and result handling
//! - [`layers`] - Affine, batch normalization, dropout, initialization
//! - [`loss`] - Softmax cross-entropy loss
//! - [`network`] - The models, their parameter store and the `Classifier` trait
//! - [`types`] - Numeric precision and train/test mode

pub mod activations;
pub mod builders;
pub mod debug;
pub mod error;
pub mod layers;
pub mod loss;
pub mod network;
pub mod types;

pub use error::{NetError, Result};
pub use network::{Classifier, FullyConnectedNet, LossOutput, TwoLayerNet};
pub use types::{Mode, Scalar};

#[cfg(test)]
mod tests;
