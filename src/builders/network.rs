use std::marker::PhantomData;

use crate::error::Result;
use crate::network::{FullyConnectedConfig, FullyConnectedNet};
use crate::types::Scalar;

/// Builder for constructing a [`FullyConnectedNet`] with a fluent API
///
/// ```rust
/// use fcnet::network::{Classifier, FullyConnectedNet};
///
/// let net = FullyConnectedNet::<f64>::builder(&[100, 50])
///     .input_dim(20)
///     .num_classes(5)
///     .dropout(0.25)
///     .batchnorm(true)
///     .reg(1e-3)
///     .seed(7)
///     .build()
///     .unwrap();
/// assert_eq!(net.num_layers(), 3);
/// assert_eq!(net.num_classes(), 5);
/// ```
#[derive(Clone, Debug)]
pub struct FullyConnectedNetBuilder<F> {
    config: FullyConnectedConfig,
    _precision: PhantomData<F>,
}

impl<F: Scalar> FullyConnectedNetBuilder<F> {
    /// Start from the default configuration with the given hidden layer widths
    pub fn new(hidden_dims: &[usize]) -> Self {
        FullyConnectedNetBuilder {
            config: FullyConnectedConfig {
                hidden_dims: hidden_dims.to_vec(),
                ..FullyConnectedConfig::default()
            },
            _precision: PhantomData,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: FullyConnectedConfig) -> Self {
        FullyConnectedNetBuilder {
            config,
            _precision: PhantomData,
        }
    }

    pub fn input_dim(mut self, input_dim: usize) -> Self {
        self.config.input_dim = input_dim;
        self
    }

    pub fn num_classes(mut self, num_classes: usize) -> Self {
        self.config.num_classes = num_classes;
        self
    }

    /// Dropout probability; 0 disables dropout
    pub fn dropout(mut self, p: f64) -> Self {
        self.config.dropout = p;
        self
    }

    pub fn batchnorm(mut self, enabled: bool) -> Self {
        self.config.use_batchnorm = enabled;
        self
    }

    /// Momentum and epsilon of every batch normalization layer
    pub fn batchnorm_params(mut self, momentum: f64, eps: f64) -> Self {
        self.config.bn_momentum = momentum;
        self.config.bn_eps = eps;
        self
    }

    pub fn reg(mut self, reg: f64) -> Self {
        self.config.reg = reg;
        self
    }

    pub fn weight_scale(mut self, weight_scale: f64) -> Self {
        self.config.weight_scale = weight_scale;
        self
    }

    /// Seed the dropout masks
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Seed the weight initialization
    pub fn init_seed(mut self, seed: u64) -> Self {
        self.config.init_seed = Some(seed);
        self
    }

    pub fn config(&self) -> &FullyConnectedConfig {
        &self.config
    }

    /// Validate the configuration and build the network
    pub fn build(self) -> Result<FullyConnectedNet<F>> {
        FullyConnectedNet::new(self.config)
    }
}
