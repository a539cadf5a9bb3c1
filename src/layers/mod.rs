//! Layer primitives the networks are assembled from.
//!
//! Each primitive is a forward/backward pair. The forward returns a cache that
//! the backward consumes by value, so a cache can be used exactly once and
//! never outlives the `loss` call that produced it.

pub mod affine;
pub mod batch_norm;
pub mod dropout;
pub mod initialization;

pub use affine::{
    affine_backward, affine_forward, affine_relu_backward, affine_relu_forward, AffineCache,
    AffineReluCache,
};
pub use batch_norm::{batchnorm_backward, batchnorm_forward, BatchNorm, BatchNormCache};
pub use dropout::{dropout_backward, dropout_forward, Dropout, DropoutCache};
pub use initialization::WeightInit;
