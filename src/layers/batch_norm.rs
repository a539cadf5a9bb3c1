use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::types::{Mode, Scalar};

/// Per-layer batch normalization state.
///
/// Holds the running mean and variance used at inference time. Both start out
/// unset and are zero-initialized the first time the layer sees a batch, so
/// the feature width does not need to be known up front.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BatchNorm<F> {
    /// Weight of the previous running statistic in the moving average
    pub momentum: F,

    /// Small constant for numerical stability
    pub epsilon: F,

    running_mean: Option<Array1<F>>,
    running_var: Option<Array1<F>>,
}

/// Values kept by [`batchnorm_forward`] for the matching backward pass.
#[derive(Debug, Clone)]
pub struct BatchNormCache<F> {
    normalized: Array2<F>,
    inv_std: Array1<F>,
    gamma: Array1<F>,
    batch_statistics: bool,
}

impl<F: Scalar> BatchNorm<F> {
    pub fn new(momentum: F, epsilon: F) -> Self {
        BatchNorm {
            momentum,
            epsilon,
            running_mean: None,
            running_var: None,
        }
    }

    pub fn running_mean(&self) -> Option<&Array1<F>> {
        self.running_mean.as_ref()
    }

    pub fn running_var(&self) -> Option<&Array1<F>> {
        self.running_var.as_ref()
    }

    /// Forget the accumulated statistics.
    pub fn reset(&mut self) {
        self.running_mean = None;
        self.running_var = None;
    }

    fn ensure_running_stats(&mut self, num_features: usize) -> Result<()> {
        for stat in [&mut self.running_mean, &mut self.running_var] {
            match stat {
                Some(existing) if existing.len() != num_features => {
                    return Err(NetError::dimension_mismatch(
                        format!("{} features (running statistics)", existing.len()),
                        format!("{} features", num_features),
                    ));
                }
                Some(_) => {}
                None => *stat = Some(Array1::zeros(num_features)),
            }
        }
        Ok(())
    }
}

impl<F: Scalar> Default for BatchNorm<F> {
    fn default() -> Self {
        BatchNorm::new(F::cast_from(0.9), F::cast_from(1e-5))
    }
}

/// Normalize each feature of `x`, then scale by `gamma` and shift by `beta`.
///
/// In training mode the batch's own mean and (biased) variance are used and
/// the running statistics are updated with an exponential moving average. In
/// test mode the running statistics are used and left untouched.
pub fn batchnorm_forward<F: Scalar>(
    x: &Array2<F>,
    gamma: &Array1<F>,
    beta: &Array1<F>,
    state: &mut BatchNorm<F>,
    mode: Mode,
) -> Result<(Array2<F>, BatchNormCache<F>)> {
    let num_features = x.ncols();
    if gamma.len() != num_features || beta.len() != num_features {
        return Err(NetError::dimension_mismatch(
            format!("gamma/beta of length {}", num_features),
            format!("gamma {} / beta {}", gamma.len(), beta.len()),
        ));
    }
    state.ensure_running_stats(num_features)?;

    let (mean, var) = match mode {
        Mode::Train => {
            let mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| NetError::dimension_mismatch("non-empty batch", "0 samples"))?;
            let var = x.var_axis(Axis(0), F::zero());

            let momentum = state.momentum;
            let keep = F::one() - momentum;
            if let Some(running_mean) = state.running_mean.as_mut() {
                running_mean.zip_mut_with(&mean, |r, &m| *r = momentum * *r + keep * m);
            }
            if let Some(running_var) = state.running_var.as_mut() {
                running_var.zip_mut_with(&var, |r, &v| *r = momentum * *r + keep * v);
            }
            (mean, var)
        }
        Mode::Test => (
            state.running_mean.clone().unwrap_or_else(|| Array1::zeros(num_features)),
            state.running_var.clone().unwrap_or_else(|| Array1::zeros(num_features)),
        ),
    };

    let epsilon = state.epsilon;
    let inv_std = var.mapv(|v| F::one() / (v + epsilon).sqrt());
    let normalized = (x - &mean) * &inv_std;
    let out = &normalized * gamma + beta;

    let cache = BatchNormCache {
        normalized,
        inv_std,
        gamma: gamma.clone(),
        batch_statistics: mode.is_training(),
    };
    Ok((out, cache))
}

/// Returns `(dx, dgamma, dbeta)`.
pub fn batchnorm_backward<F: Scalar>(
    dout: &Array2<F>,
    cache: BatchNormCache<F>,
) -> (Array2<F>, Array1<F>, Array1<F>) {
    let dbeta = dout.sum_axis(Axis(0));
    let dgamma = (dout * &cache.normalized).sum_axis(Axis(0));
    let dnormalized = dout * &cache.gamma;

    if !cache.batch_statistics {
        // Fixed statistics: the normalization is a per-feature affine map
        let dx = dnormalized * &cache.inv_std;
        return (dx, dgamma, dbeta);
    }

    let n = F::cast_from(dout.nrows() as f64);
    let sum_dnorm = dnormalized.sum_axis(Axis(0));
    let sum_dnorm_xhat = (&dnormalized * &cache.normalized).sum_axis(Axis(0));
    let dx = (&dnormalized * n - &sum_dnorm - &cache.normalized * &sum_dnorm_xhat) * &(&cache.inv_std / n);

    (dx, dgamma, dbeta)
}
