use ndarray::{Array2, ArrayBase, Data, Dimension, LinalgScalar, ScalarOperand};
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use crate::error::{NetError, Result};

/// Floating point precision a model computes in.
///
/// Implemented for `f32` (fast) and `f64` (needed for numerical gradient checks).
pub trait Scalar:
    Float
    + FromPrimitive
    + LinalgScalar
    + ScalarOperand
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Sum
    + Debug
    + Display
    + Default
    + Send
    + Sync
    + 'static
{
    /// Convert from `f64`, rounding if the target is narrower.
    fn cast_from(value: f64) -> Self;

    /// Widen to `f64`.
    fn as_f64(self) -> f64;
}

impl Scalar for f32 {
    #[inline]
    fn cast_from(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Scalar for f64 {
    #[inline]
    fn cast_from(value: f64) -> Self {
        value
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

/// Whether a forward pass runs with training or inference semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Train,
    Test,
}

impl Mode {
    pub fn is_training(self) -> bool {
        matches!(self, Mode::Train)
    }
}

/// Cast a batch of `N` samples with arbitrary trailing dimensions into an
/// `[N, input_dim]` matrix of precision `F`.
pub fn flatten_batch<F, S, D>(inputs: &ArrayBase<S, D>, input_dim: usize) -> Result<Array2<F>>
where
    F: Scalar,
    S: Data,
    S::Elem: Scalar,
    D: Dimension,
{
    let shape = inputs.shape();
    if shape.len() < 2 {
        return Err(NetError::dimension_mismatch(
            "input of rank >= 2 (batch, features...)".to_string(),
            format!("rank {}", shape.len()),
        ));
    }

    let batch_size = shape[0];
    if batch_size == 0 {
        return Err(NetError::dimension_mismatch(
            "non-empty batch".to_string(),
            "0 samples".to_string(),
        ));
    }

    let features: usize = shape[1..].iter().product();
    if features != input_dim {
        return Err(NetError::dimension_mismatch(
            format!("{} features per sample", input_dim),
            format!("{} features (shape {:?})", features, shape),
        ));
    }

    // iter() walks in logical row-major order regardless of memory layout
    let flat: Vec<F> = inputs.iter().map(|&v| F::cast_from(v.as_f64())).collect();
    Array2::from_shape_vec((batch_size, input_dim), flat)
        .map_err(|e| NetError::dimension_mismatch(format!("{} x {}", batch_size, input_dim), e.to_string()))
}

/// Check that `labels` has one entry per sample and every entry is a valid class.
pub fn validate_labels(labels: &[usize], batch_size: usize, num_classes: usize) -> Result<()> {
    if labels.len() != batch_size {
        return Err(NetError::dimension_mismatch(
            format!("{} labels", batch_size),
            format!("{} labels", labels.len()),
        ));
    }
    match labels.iter().find(|&&label| label >= num_classes) {
        Some(&label) => Err(NetError::InvalidLabel { label, num_classes }),
        None => Ok(()),
    }
}
