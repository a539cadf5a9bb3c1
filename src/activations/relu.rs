use ndarray::Array2;

use crate::types::Scalar;

/// Values kept by [`relu_forward`] for the matching backward pass.
#[derive(Debug, Clone)]
pub struct ReluCache<F> {
    input: Array2<F>,
}

/// Rectified linear unit, `max(0, x)` applied elementwise.
pub fn relu_forward<F: Scalar>(x: &Array2<F>) -> (Array2<F>, ReluCache<F>) {
    let out = x.mapv(|v| v.max(F::zero()));
    (out, ReluCache { input: x.clone() })
}

/// Gradient of the ReLU: the upstream gradient where the input was positive, zero elsewhere.
pub fn relu_backward<F: Scalar>(dout: &Array2<F>, cache: ReluCache<F>) -> Array2<F> {
    let mut dx = cache.input;
    dx.zip_mut_with(dout, |x, &d| {
        *x = if *x > F::zero() { d } else { F::zero() };
    });
    dx
}
