use ndarray::{Array1, Array2, Axis};

use crate::activations::{relu_backward, relu_forward, ReluCache};
use crate::types::Scalar;

/// Values kept by [`affine_forward`] for the matching backward pass.
#[derive(Debug, Clone)]
pub struct AffineCache<F> {
    inputs: Array2<F>,
    weights: Array2<F>,
}

/// Cache of the fused affine-ReLU block.
#[derive(Debug, Clone)]
pub struct AffineReluCache<F> {
    affine: AffineCache<F>,
    relu: ReluCache<F>,
}

/// Linear transform `x . W + b` for a batch of row vectors.
pub fn affine_forward<F: Scalar>(
    x: &Array2<F>,
    weights: &Array2<F>,
    biases: &Array1<F>,
) -> (Array2<F>, AffineCache<F>) {
    let out = x.dot(weights) + biases;
    let cache = AffineCache {
        inputs: x.clone(),
        weights: weights.clone(),
    };
    (out, cache)
}

/// Returns `(dx, dW, db)` for an upstream gradient `dout` of shape `[N, out_dim]`.
pub fn affine_backward<F: Scalar>(
    dout: &Array2<F>,
    cache: AffineCache<F>,
) -> (Array2<F>, Array2<F>, Array1<F>) {
    let dx = dout.dot(&cache.weights.t());
    let dw = cache.inputs.t().dot(dout);
    let db = dout.sum_axis(Axis(0));
    (dx, dw, db)
}

/// Affine transform followed by a ReLU.
pub fn affine_relu_forward<F: Scalar>(
    x: &Array2<F>,
    weights: &Array2<F>,
    biases: &Array1<F>,
) -> (Array2<F>, AffineReluCache<F>) {
    let (a, affine) = affine_forward(x, weights, biases);
    let (out, relu) = relu_forward(&a);
    (out, AffineReluCache { affine, relu })
}

pub fn affine_relu_backward<F: Scalar>(
    dout: &Array2<F>,
    cache: AffineReluCache<F>,
) -> (Array2<F>, Array2<F>, Array1<F>) {
    let da = relu_backward(dout, cache.relu);
    affine_backward(&da, cache.affine)
}
