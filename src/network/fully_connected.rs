use ndarray::{Array2, ArrayBase, Data, Dimension};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::iter;
use std::path::Path;

use crate::builders::FullyConnectedNetBuilder;
use crate::error::{NetError, Result};
use crate::layers::{affine_backward, affine_forward, AffineCache, BatchNorm, Dropout, WeightInit};
use crate::loss::softmax_loss;
use crate::network::blocks::{BlockCache, HiddenBlock};
use crate::network::params::{Gradients, LayerParams, NormParams, ParamName, ParamStore};
use crate::network::traits::Classifier;
use crate::network::{check_dim, check_non_negative, load_from, save_to};
use crate::types::{flatten_batch, validate_labels, Mode, Scalar};

/// Construction settings for a [`FullyConnectedNet`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FullyConnectedConfig {
    /// Width of each hidden layer; the network has `hidden_dims.len() + 1` layers
    pub hidden_dims: Vec<usize>,
    pub input_dim: usize,
    pub num_classes: usize,
    /// Dropout probability, 0 disables dropout entirely
    pub dropout: f64,
    pub use_batchnorm: bool,
    /// L2 regularization strength
    pub reg: f64,
    /// Standard deviation of the initial weights
    pub weight_scale: f64,
    /// Makes dropout masks deterministic
    pub seed: Option<u64>,
    /// Makes weight initialization deterministic
    pub init_seed: Option<u64>,
    pub bn_momentum: f64,
    pub bn_eps: f64,
}

impl Default for FullyConnectedConfig {
    fn default() -> Self {
        FullyConnectedConfig {
            hidden_dims: Vec::new(),
            input_dim: 3 * 32 * 32,
            num_classes: 10,
            dropout: 0.0,
            use_batchnorm: false,
            reg: 0.0,
            weight_scale: 1e-2,
            seed: None,
            init_seed: None,
            bn_momentum: 0.9,
            bn_eps: 1e-5,
        }
    }
}

impl FullyConnectedConfig {
    pub fn validate(&self) -> Result<()> {
        check_dim("input_dim", self.input_dim)?;
        check_dim("num_classes", self.num_classes)?;
        for (i, &dim) in self.hidden_dims.iter().enumerate() {
            check_dim(&format!("hidden_dims[{}]", i), dim)?;
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(NetError::invalid_parameter(
                "dropout".to_string(),
                format!("probability must be in [0, 1), got {}", self.dropout),
            ));
        }
        check_non_negative("reg", self.reg)?;
        check_non_negative("weight_scale", self.weight_scale)?;
        if !(0.0..1.0).contains(&self.bn_momentum) {
            return Err(NetError::invalid_parameter(
                "bn_momentum".to_string(),
                format!("must be in [0, 1), got {}", self.bn_momentum),
            ));
        }
        if !(self.bn_eps.is_finite() && self.bn_eps > 0.0) {
            return Err(NetError::invalid_parameter(
                "bn_eps".to_string(),
                format!("must be finite and positive, got {}", self.bn_eps),
            ));
        }
        Ok(())
    }

    pub fn num_layers(&self) -> usize {
        self.hidden_dims.len() + 1
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: FullyConnectedConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A fully-connected network with an arbitrary number of hidden layers:
///
/// `{affine -> [batchnorm] -> relu -> [dropout]} x (L - 1) -> affine -> softmax`
///
/// Batch normalization and dropout are optional and chosen at construction.
/// Parameters are `W{i}`, `b{i}` for every layer and `gamma{i}`, `beta{i}` for
/// the hidden layers when batch normalization is on.
///
/// Training-mode calls update each batch normalization layer's running
/// statistics, so calls on one instance must not overlap.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FullyConnectedNet<F> {
    config: FullyConnectedConfig,
    params: ParamStore<F>,
    blocks: Vec<HiddenBlock<F>>,
}

impl<F: Scalar> FullyConnectedNet<F> {
    pub fn new(config: FullyConnectedConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.init_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let dropout = if config.dropout > 0.0 {
            Some(Dropout::new(config.dropout, config.seed)?)
        } else {
            None
        };

        let dims: Vec<usize> = iter::once(config.input_dim)
            .chain(config.hidden_dims.iter().copied())
            .chain(iter::once(config.num_classes))
            .collect();
        let num_hidden = config.hidden_dims.len();
        let init = WeightInit::Gaussian { std: config.weight_scale };

        let mut layers = Vec::with_capacity(dims.len() - 1);
        let mut blocks = Vec::with_capacity(num_hidden);
        for (i, window) in dims.windows(2).enumerate() {
            let (in_dim, out_dim) = (window[0], window[1]);
            let is_hidden = i < num_hidden;

            let norm = if config.use_batchnorm && is_hidden {
                Some(NormParams {
                    gamma: WeightInit::Ones.initialize_vector(out_dim, &mut rng)?,
                    beta: WeightInit::Zeros.initialize_vector(out_dim, &mut rng)?,
                })
            } else {
                None
            };
            layers.push(LayerParams {
                weights: init.initialize_weights((in_dim, out_dim), &mut rng)?,
                biases: WeightInit::Zeros.initialize_vector(out_dim, &mut rng)?,
                norm,
            });

            if is_hidden {
                let batch_norm = config.use_batchnorm.then(|| {
                    BatchNorm::new(F::cast_from(config.bn_momentum), F::cast_from(config.bn_eps))
                });
                blocks.push(HiddenBlock::new(batch_norm, dropout));
            }
        }

        log::debug!(
            "FullyConnectedNet: dims {:?}, batchnorm={}, dropout={}, reg={}",
            dims,
            config.use_batchnorm,
            config.dropout,
            config.reg
        );

        Ok(FullyConnectedNet {
            config,
            params: ParamStore::new(layers),
            blocks,
        })
    }

    pub fn builder(hidden_dims: &[usize]) -> FullyConnectedNetBuilder<F> {
        FullyConnectedNetBuilder::new(hidden_dims)
    }

    pub fn config(&self) -> &FullyConnectedConfig {
        &self.config
    }

    pub fn num_layers(&self) -> usize {
        self.params.num_layers()
    }

    pub fn uses_batchnorm(&self) -> bool {
        self.config.use_batchnorm
    }

    pub fn uses_dropout(&self) -> bool {
        self.config.dropout > 0.0
    }

    pub fn reg(&self) -> f64 {
        self.config.reg
    }

    pub fn set_reg(&mut self, reg: f64) -> Result<()> {
        check_non_negative("reg", reg)?;
        self.config.reg = reg;
        Ok(())
    }

    pub fn blocks(&self) -> &[HiddenBlock<F>] {
        &self.blocks
    }

    /// Batch normalization state of hidden layer `layer` (1-based).
    pub fn batch_norm(&self, layer: usize) -> Option<&BatchNorm<F>> {
        layer
            .checked_sub(1)
            .and_then(|i| self.blocks.get(i))
            .and_then(HiddenBlock::batch_norm)
    }

    /// Clear the running statistics of every batch normalization layer.
    pub fn reset_running_stats(&mut self) {
        for bn in self.blocks.iter_mut().filter_map(HiddenBlock::batch_norm_mut) {
            bn.reset();
        }
    }

    /// Forward pass with an explicit mode, returning class scores.
    ///
    /// In [`Mode::Train`] dropout is active, batch normalization uses batch
    /// statistics and its running statistics are updated; no gradients are
    /// computed.
    pub fn forward<S, D>(&mut self, inputs: &ArrayBase<S, D>, mode: Mode) -> Result<Array2<F>>
    where
        S: Data,
        S::Elem: Scalar,
        D: Dimension,
    {
        let x = flatten_batch::<F, _, _>(inputs, self.input_dim())?;
        let (scores, _, _) = self.forward_with_caches(&x, mode)?;
        Ok(scores)
    }

    fn forward_with_caches(
        &mut self,
        x: &Array2<F>,
        mode: Mode,
    ) -> Result<(Array2<F>, Vec<BlockCache<F>>, AffineCache<F>)> {
        let layers = self.params.layers();
        if layers.len() != self.blocks.len() + 1 {
            return Err(NetError::dimension_mismatch(
                format!("{} layers", self.blocks.len() + 1),
                format!("{} layers", layers.len()),
            ));
        }
        self.params.check_chain(self.config.input_dim, self.config.num_classes)?;
        for (i, (block, params)) in self.blocks.iter().zip(layers).enumerate() {
            if block.batch_norm().is_some() != params.norm.is_some() {
                return Err(NetError::UnknownParameter(ParamName::gamma(i + 1).to_string()));
            }
        }
        let output = layers
            .last()
            .ok_or_else(|| NetError::dimension_mismatch("at least one layer", "none"))?;

        let mut hidden = x.to_owned();
        let mut caches = Vec::with_capacity(self.blocks.len());
        for (i, (block, params)) in self.blocks.iter_mut().zip(layers).enumerate() {
            let (out, cache) = block.forward(&hidden, params, i + 1, mode)?;
            hidden = out;
            caches.push(cache);
        }

        let (scores, output_cache) = affine_forward(&hidden, &output.weights, &output.biases);
        Ok((scores, caches, output_cache))
    }

    /// Save the network, including batch normalization running statistics.
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

impl<F: Scalar> Classifier<F> for FullyConnectedNet<F> {
    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn num_classes(&self) -> usize {
        self.config.num_classes
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
        let scores = self.forward(inputs, Mode::Test)?;
        log::trace!("FullyConnectedNet: scored batch of {}", scores.nrows());
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

        let (scores, caches, output_cache) = self.forward_with_caches(&x, Mode::Train)?;

        let reg = F::cast_from(self.config.reg);
        let (data_loss, dscores) = softmax_loss(&scores, labels);
        let loss = data_loss + F::cast_from(0.5) * reg * self.params.squared_weight_norm();

        let layers = self.params.layers();
        let num_hidden = caches.len();
        let mut grads = Vec::with_capacity(layers.len());

        let (mut dout, mut dw, db) = affine_backward(&dscores, output_cache);
        dw.scaled_add(reg, &layers[num_hidden].weights);
        grads.push(LayerParams { weights: dw, biases: db, norm: None });

        for (cache, params) in caches.into_iter().zip(&layers[..num_hidden]).rev() {
            let (dx, mut layer_grads) = cache.backward(&dout);
            layer_grads.weights.scaled_add(reg, &params.weights);
            grads.push(layer_grads);
            dout = dx;
        }
        grads.reverse();

        log::trace!(
            "FullyConnectedNet: batch of {}, data loss {}, total loss {}",
            x.nrows(),
            data_loss,
            loss
        );
        Ok((loss, ParamStore::new(grads)))
    }
}
