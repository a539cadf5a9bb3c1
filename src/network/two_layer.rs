use ndarray::{Array2, ArrayBase, Data, Dimension};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{NetError, Result};
use crate::layers::{
    affine_backward, affine_forward, affine_relu_backward, affine_relu_forward, WeightInit,
};
use crate::loss::softmax_loss;
use crate::network::params::{Gradients, LayerParams, ParamName, ParamStore};
use crate::network::traits::Classifier;
use crate::network::{check_dim, check_non_negative, load_from, save_to};
use crate::types::{flatten_batch, validate_labels, Scalar};

/// A two-layer fully-connected network with a ReLU hidden layer and softmax
/// loss: `affine -> relu -> affine -> softmax`.
///
/// Parameters are `W1: [input_dim, hidden_dim]`, `b1`, `W2: [hidden_dim,
/// num_classes]` and `b2`. The network does not update itself; an external
/// optimizer reads the gradients from [`Classifier::train_loss`] and writes
/// through [`Classifier::params_mut`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TwoLayerNet<F> {
    params: ParamStore<F>,
    reg: f64,
}

impl<F: Scalar> TwoLayerNet<F> {
    /// Weights are drawn from `N(0, weight_scale^2)`, biases start at zero.
    /// `reg` is the L2 regularization strength.
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        num_classes: usize,
        weight_scale: f64,
        reg: f64,
    ) -> Result<Self> {
        Self::with_rng(input_dim, hidden_dim, num_classes, weight_scale, reg, &mut rand::thread_rng())
    }

    /// Same as [`TwoLayerNet::new`] but drawing the weights from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        input_dim: usize,
        hidden_dim: usize,
        num_classes: usize,
        weight_scale: f64,
        reg: f64,
        rng: &mut R,
    ) -> Result<Self> {
        check_dim("input_dim", input_dim)?;
        check_dim("hidden_dim", hidden_dim)?;
        check_dim("num_classes", num_classes)?;
        check_non_negative("weight_scale", weight_scale)?;
        check_non_negative("reg", reg)?;

        let init = WeightInit::Gaussian { std: weight_scale };
        let layers = vec![
            LayerParams {
                weights: init.initialize_weights((input_dim, hidden_dim), rng)?,
                biases: WeightInit::Zeros.initialize_vector(hidden_dim, rng)?,
                norm: None,
            },
            LayerParams {
                weights: init.initialize_weights((hidden_dim, num_classes), rng)?,
                biases: WeightInit::Zeros.initialize_vector(num_classes, rng)?,
                norm: None,
            },
        ];

        log::debug!(
            "TwoLayerNet: {} -> {} -> {} (weight_scale={}, reg={})",
            input_dim,
            hidden_dim,
            num_classes,
            weight_scale,
            reg
        );

        Ok(TwoLayerNet {
            params: ParamStore::new(layers),
            reg,
        })
    }

    pub fn reg(&self) -> f64 {
        self.reg
    }

    pub fn set_reg(&mut self, reg: f64) -> Result<()> {
        check_non_negative("reg", reg)?;
        self.reg = reg;
        Ok(())
    }

    pub fn hidden_dim(&self) -> usize {
        self.params.layers().first().map_or(0, |l| l.output_dim())
    }

    fn layers(&self) -> Result<(&LayerParams<F>, &LayerParams<F>)> {
        match self.params.layers() {
            [hidden, output] => {
                self.params.check_chain(hidden.input_dim(), output.output_dim())?;
                if let Some(layer) = [hidden, output].iter().position(|l| l.norm.is_some()) {
                    return Err(NetError::UnknownParameter(ParamName::gamma(layer + 1).to_string()));
                }
                Ok((hidden, output))
            }
            other => Err(NetError::dimension_mismatch(
                "2 layers".to_string(),
                format!("{} layers", other.len()),
            )),
        }
    }

    /// Save the network, parameters included, to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>
    where
        F: Serialize,
    {
        save_to(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self>
    where
        F: DeserializeOwned,
    {
        load_from(path)
    }
}

impl<F: Scalar> Classifier<F> for TwoLayerNet<F> {
    fn input_dim(&self) -> usize {
        self.params.layers().first().map_or(0, |l| l.input_dim())
    }

    fn num_classes(&self) -> usize {
        self.params.layers().last().map_or(0, |l| l.output_dim())
    }

    fn params(&self) -> &ParamStore<F> {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamStore<F> {
        &mut self.params
    }

    fn scores<S, D>(&mut self, inputs: &ArrayBase<S, D>) -> Result<Array2<F>>
    where
        S: Data,
        S::Elem: Scalar,
        D: Dimension,
    {
        let x = flatten_batch::<F, _, _>(inputs, self.input_dim())?;
        let (hidden, output) = self.layers()?;

        let (h1, _) = affine_relu_forward(&x, &hidden.weights, &hidden.biases);
        let (scores, _) = affine_forward(&h1, &output.weights, &output.biases);

        log::trace!("TwoLayerNet: scored batch of {}", x.nrows());
        Ok(scores)
    }

    fn train_loss<S, D>(&mut self, inputs: &ArrayBase<S, D>, labels: &[usize]) -> Result<(F, Gradients<F>)>
    where
        S: Data,
        S::Elem: Scalar,
        D: Dimension,
    {
        let x = flatten_batch::<F, _, _>(inputs, self.input_dim())?;
        validate_labels(labels, x.nrows(), self.num_classes())?;
        let (hidden, output) = self.layers()?;
        let reg = F::cast_from(self.reg);

        let (h1, hidden_cache) = affine_relu_forward(&x, &hidden.weights, &hidden.biases);
        let (scores, output_cache) = affine_forward(&h1, &output.weights, &output.biases);

        let (data_loss, dscores) = softmax_loss(&scores, labels);
        let loss = data_loss + F::cast_from(0.5) * reg * self.params.squared_weight_norm();

        let (dh1, mut dw2, db2) = affine_backward(&dscores, output_cache);
        dw2.scaled_add(reg, &output.weights);
        let (_dx, mut dw1, db1) = affine_relu_backward(&dh1, hidden_cache);
        dw1.scaled_add(reg, &hidden.weights);

        let grads = ParamStore::new(vec![
            LayerParams { weights: dw1, biases: db1, norm: None },
            LayerParams { weights: dw2, biases: db2, norm: None },
        ]);

        log::trace!("TwoLayerNet: batch of {}, loss {}", x.nrows(), loss);
        Ok((loss, grads))
    }
}
