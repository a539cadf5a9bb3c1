use ndarray::{Array2, ArrayBase, Data, Dimension};

use crate::error::Result;
use crate::network::params::{Gradients, ParamStore};
use crate::types::Scalar;

/// Result of a [`Classifier::loss`] call.
#[derive(Debug, Clone)]
pub enum LossOutput<F> {
    /// Inference mode: class scores of shape `[N, num_classes]`
    Scores(Array2<F>),

    /// Training mode: scalar loss and its gradient for every parameter
    Training { loss: F, grads: Gradients<F> },
}

impl<F> LossOutput<F> {
    pub fn scores(self) -> Option<Array2<F>> {
        match self {
            LossOutput::Scores(scores) => Some(scores),
            LossOutput::Training { .. } => None,
        }
    }

    pub fn training(self) -> Option<(F, Gradients<F>)> {
        match self {
            LossOutput::Training { loss, grads } => Some((loss, grads)),
            LossOutput::Scores(_) => None,
        }
    }
}

/// A model that scores a batch of samples and, given labels, computes a loss
/// and its gradients for an external optimizer.
///
/// Inputs may have any number of trailing dimensions as long as their product
/// equals [`input_dim`](Classifier::input_dim); they are cast to the model's
/// precision before the forward pass.
pub trait Classifier<F: Scalar> {
    fn input_dim(&self) -> usize;

    fn num_classes(&self) -> usize;

    /// Learnable parameters.
    fn params(&self) -> &ParamStore<F>;

    /// Mutable access for optimizers, used between calls.
    fn params_mut(&mut self) -> &mut ParamStore<F>;

    /// Inference-mode forward pass.
    fn scores<S, D>(&mut self, inputs: &ArrayBase<S, D>) -> Result<Array2<F>>
    where
        S: Data,
        S::Elem: Scalar,
        D: Dimension;

    /// Training-mode forward and backward pass.
    fn train_loss<S, D>(&mut self, inputs: &ArrayBase<S, D>, labels: &[usize]) -> Result<(F, Gradients<F>)>
    where
        S: Data,
        S::Elem: Scalar,
        D: Dimension;

    /// Scores when `labels` is `None`, otherwise loss and gradients.
    fn loss<S, D>(&mut self, inputs: &ArrayBase<S, D>, labels: Option<&[usize]>) -> Result<LossOutput<F>>
    where
        S: Data,
        S::Elem: Scalar,
        D: Dimension,
    {
        match labels {
            None => self.scores(inputs).map(LossOutput::Scores),
            Some(labels) => {
                let (loss, grads) = self.train_loss(inputs, labels)?;
                Ok(LossOutput::Training { loss, grads })
            }
        }
    }
}
