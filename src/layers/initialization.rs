use ndarray::{Array, Array1, Array2, Dimension, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::types::Scalar;

/// Parameter initialization strategies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Zero-mean normal distribution with the given standard deviation
    Gaussian { std: f64 },

    /// All zeros
    Zeros,

    /// All ones
    Ones,
}

impl WeightInit {
    /// Initialize an array of any dimensionality.
    ///
    /// Random values are drawn in `f64` and then cast to `F`.
    pub fn initialize<F, Sh, D, R>(&self, shape: Sh, rng: &mut R) -> Result<Array<F, D>>
    where
        F: Scalar,
        Sh: ShapeBuilder<Dim = D>,
        D: Dimension,
        R: Rng + ?Sized,
    {
        match *self {
            WeightInit::Gaussian { std } => {
                let normal = Normal::new(0.0, std).map_err(|e| {
                    NetError::invalid_parameter("weight_scale".to_string(), e.to_string())
                })?;
                Ok(Array::<f64, D>::random_using(shape, normal, rng).mapv(F::cast_from))
            }
            WeightInit::Zeros => Ok(Array::zeros(shape)),
            WeightInit::Ones => Ok(Array::ones(shape)),
        }
    }

    pub fn initialize_weights<F: Scalar, R: Rng + ?Sized>(
        &self,
        shape: (usize, usize),
        rng: &mut R,
    ) -> Result<Array2<F>> {
        self.initialize(shape, rng)
    }

    pub fn initialize_vector<F: Scalar, R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<Array1<F>> {
        self.initialize(size, rng)
    }
}
