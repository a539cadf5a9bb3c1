use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::types::{Mode, Scalar};

/// Inverted dropout configuration.
///
/// During training each unit is zeroed with probability `p` and survivors are
/// scaled by `1 / (1 - p)`, so inference is a plain identity.
///
/// With a seed set, the mask generator restarts from that seed on every
/// training-mode forward. Every call therefore draws the same mask for a given
/// shape, and because a network shares one `Dropout` across its hidden blocks,
/// hidden layers of equal width also get identical masks within a call. This
/// keeps the loss a deterministic function of the parameters for gradient
/// checks. Leave the seed unset for independent masks.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Dropout {
    /// Probability of dropping a unit
    pub p: f64,

    /// Seed the mask generator restarts from on every training-mode call
    pub seed: Option<u64>,
}

/// Values kept by [`dropout_forward`] for the matching backward pass.
#[derive(Debug, Clone)]
pub struct DropoutCache<F> {
    mask: Option<Array2<F>>,
}

impl Dropout {
    pub fn new(p: f64, seed: Option<u64>) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(NetError::invalid_parameter(
                "dropout".to_string(),
                format!("probability must be in [0, 1), got {}", p),
            ));
        }
        Ok(Dropout { p, seed })
    }

    fn mask_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn sample_mask<F: Scalar>(&self, shape: (usize, usize)) -> Array2<F> {
        let mut rng = self.mask_rng();
        let scale = F::cast_from(1.0 / (1.0 - self.p));
        let p = self.p;
        Array2::<f64>::random_using(shape, Uniform::new(0.0, 1.0), &mut rng)
            .mapv(|u| if u < p { F::zero() } else { scale })
    }
}

pub fn dropout_forward<F: Scalar>(
    x: &Array2<F>,
    config: &Dropout,
    mode: Mode,
) -> (Array2<F>, DropoutCache<F>) {
    if !mode.is_training() || config.p == 0.0 {
        return (x.clone(), DropoutCache { mask: None });
    }

    let mask = config.sample_mask::<F>(x.dim());
    let out = x * &mask;
    (out, DropoutCache { mask: Some(mask) })
}

/// Routes the upstream gradient through the units that survived the forward pass.
pub fn dropout_backward<F: Scalar>(dout: &Array2<F>, cache: DropoutCache<F>) -> Array2<F> {
    match cache.mask {
        Some(mask) => mask * dout,
        None => dout.clone(),
    }
}
