use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::activations::{relu_backward, relu_forward, ReluCache};
use crate::error::{NetError, Result};
use crate::layers::{
    affine_backward, affine_forward, affine_relu_backward, affine_relu_forward, batchnorm_backward,
    batchnorm_forward, dropout_backward, dropout_forward, AffineCache, AffineReluCache, BatchNorm,
    BatchNormCache, Dropout, DropoutCache,
};
use crate::network::params::{LayerParams, NormParams, ParamName};
use crate::types::{Mode, Scalar};

/// One hidden block of a [`FullyConnectedNet`](super::FullyConnectedNet):
/// `affine -> [batchnorm] -> relu -> [dropout]`.
///
/// The variant is fixed when the network is built, so the forward and
/// backward passes dispatch once per block instead of re-checking flags.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum HiddenBlock<F> {
    AffineRelu,
    AffineReluDropout(Dropout),
    AffineNormRelu(BatchNorm<F>),
    AffineNormReluDropout(BatchNorm<F>, Dropout),
}

/// Everything a block's backward pass needs, produced by its forward pass.
#[derive(Debug, Clone)]
pub enum BlockCache<F> {
    AffineRelu(AffineReluCache<F>),
    AffineReluDropout(AffineReluCache<F>, DropoutCache<F>),
    AffineNormRelu(NormReluCache<F>),
    AffineNormReluDropout(NormReluCache<F>, DropoutCache<F>),
}

#[derive(Debug, Clone)]
pub struct NormReluCache<F> {
    affine: AffineCache<F>,
    norm: BatchNormCache<F>,
    relu: ReluCache<F>,
}

impl<F: Scalar> HiddenBlock<F> {
    pub fn new(batch_norm: Option<BatchNorm<F>>, dropout: Option<Dropout>) -> Self {
        match (batch_norm, dropout) {
            (None, None) => HiddenBlock::AffineRelu,
            (None, Some(dropout)) => HiddenBlock::AffineReluDropout(dropout),
            (Some(bn), None) => HiddenBlock::AffineNormRelu(bn),
            (Some(bn), Some(dropout)) => HiddenBlock::AffineNormReluDropout(bn, dropout),
        }
    }

    pub fn batch_norm(&self) -> Option<&BatchNorm<F>> {
        match self {
            HiddenBlock::AffineNormRelu(bn) | HiddenBlock::AffineNormReluDropout(bn, _) => Some(bn),
            HiddenBlock::AffineRelu | HiddenBlock::AffineReluDropout(_) => None,
        }
    }

    pub fn batch_norm_mut(&mut self) -> Option<&mut BatchNorm<F>> {
        match self {
            HiddenBlock::AffineNormRelu(bn) | HiddenBlock::AffineNormReluDropout(bn, _) => Some(bn),
            HiddenBlock::AffineRelu | HiddenBlock::AffineReluDropout(_) => None,
        }
    }

    pub fn dropout(&self) -> Option<&Dropout> {
        match self {
            HiddenBlock::AffineReluDropout(dropout) | HiddenBlock::AffineNormReluDropout(_, dropout) => {
                Some(dropout)
            }
            HiddenBlock::AffineRelu | HiddenBlock::AffineNormRelu(_) => None,
        }
    }

    /// Run the block on `x` with the parameters of (1-based) layer `layer`.
    pub fn forward(
        &mut self,
        x: &Array2<F>,
        params: &LayerParams<F>,
        layer: usize,
        mode: Mode,
    ) -> Result<(Array2<F>, BlockCache<F>)> {
        match self {
            HiddenBlock::AffineRelu => {
                let (out, cache) = affine_relu_forward(x, &params.weights, &params.biases);
                Ok((out, BlockCache::AffineRelu(cache)))
            }
            HiddenBlock::AffineReluDropout(dropout) => {
                let (hidden, cache) = affine_relu_forward(x, &params.weights, &params.biases);
                let (out, dropout_cache) = dropout_forward(&hidden, dropout, mode);
                Ok((out, BlockCache::AffineReluDropout(cache, dropout_cache)))
            }
            HiddenBlock::AffineNormRelu(bn) => {
                let (out, cache) = norm_relu_forward(x, params, layer, bn, mode)?;
                Ok((out, BlockCache::AffineNormRelu(cache)))
            }
            HiddenBlock::AffineNormReluDropout(bn, dropout) => {
                let (hidden, cache) = norm_relu_forward(x, params, layer, bn, mode)?;
                let (out, dropout_cache) = dropout_forward(&hidden, dropout, mode);
                Ok((out, BlockCache::AffineNormReluDropout(cache, dropout_cache)))
            }
        }
    }
}

impl<F: Scalar> BlockCache<F> {
    /// Walk the block in reverse: `[dropout] -> relu -> [batchnorm] -> affine`.
    ///
    /// Returns the gradient w.r.t. the block input and the unregularized
    /// gradients of the block's parameters.
    pub fn backward(self, dout: &Array2<F>) -> (Array2<F>, LayerParams<F>) {
        match self {
            BlockCache::AffineRelu(cache) => plain_backward(dout, cache),
            BlockCache::AffineReluDropout(cache, dropout_cache) => {
                let dhidden = dropout_backward(dout, dropout_cache);
                plain_backward(&dhidden, cache)
            }
            BlockCache::AffineNormRelu(cache) => norm_relu_backward(dout, cache),
            BlockCache::AffineNormReluDropout(cache, dropout_cache) => {
                let dhidden = dropout_backward(dout, dropout_cache);
                norm_relu_backward(&dhidden, cache)
            }
        }
    }
}

fn norm_relu_forward<F: Scalar>(
    x: &Array2<F>,
    params: &LayerParams<F>,
    layer: usize,
    bn: &mut BatchNorm<F>,
    mode: Mode,
) -> Result<(Array2<F>, NormReluCache<F>)> {
    let norm = params
        .norm
        .as_ref()
        .ok_or_else(|| NetError::UnknownParameter(ParamName::gamma(layer).to_string()))?;

    let (affine_out, affine) = affine_forward(x, &params.weights, &params.biases);
    let (normalized, norm_cache) = batchnorm_forward(&affine_out, &norm.gamma, &norm.beta, bn, mode)?;
    let (out, relu) = relu_forward(&normalized);

    Ok((out, NormReluCache { affine, norm: norm_cache, relu }))
}

fn plain_backward<F: Scalar>(dout: &Array2<F>, cache: AffineReluCache<F>) -> (Array2<F>, LayerParams<F>) {
    let (dx, weights, biases) = affine_relu_backward(dout, cache);
    (dx, LayerParams { weights, biases, norm: None })
}

fn norm_relu_backward<F: Scalar>(dout: &Array2<F>, cache: NormReluCache<F>) -> (Array2<F>, LayerParams<F>) {
    let dnormalized = relu_backward(dout, cache.relu);
    let (daffine, gamma, beta) = batchnorm_backward(&dnormalized, cache.norm);
    let (dx, weights, biases) = affine_backward(&daffine, cache.affine);
    let grads = LayerParams {
        weights,
        biases,
        norm: Some(NormParams { gamma, beta }),
    };
    (dx, grads)
}
