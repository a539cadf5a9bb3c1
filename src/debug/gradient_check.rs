use ndarray::{ArrayBase, ArrayViewD, Data, Dimension, IxDyn};

use crate::error::{NetError, Result};
use crate::network::{Classifier, Gradients, ParamName};
use crate::types::Scalar;

/// Central-difference estimate of the gradient of the training loss with
/// respect to every parameter entry.
///
/// Each entry is nudged by `+h` and `-h` in turn and restored afterwards, so
/// the model's parameters are unchanged on return. Dropout must be seeded for
/// the estimate to be meaningful.
pub fn eval_numerical_gradient<F, M, S, D>(
    model: &mut M,
    inputs: &ArrayBase<S, D>,
    labels: &[usize],
    h: f64,
) -> Result<Gradients<F>>
where
    F: Scalar,
    M: Classifier<F>,
    S: Data,
    S::Elem: Scalar,
    D: Dimension,
{
    let step = F::cast_from(h);
    let mut numerical = model.params().clone();

    for name in model.params().names() {
        let shape = param_shape(model, &name)?;
        for index in ndarray::indices(IxDyn(&shape)) {
            let original = nudge(model, &name, index.slice(), None)?;

            nudge(model, &name, index.slice(), Some(original + step))?;
            let (loss_plus, _) = model.train_loss(inputs, labels)?;
            nudge(model, &name, index.slice(), Some(original - step))?;
            let (loss_minus, _) = model.train_loss(inputs, labels)?;
            nudge(model, &name, index.slice(), Some(original))?;

            let mut slot = numerical
                .get_mut(&name)
                .ok_or_else(|| NetError::UnknownParameter(name.to_string()))?;
            slot[index.slice()] = (loss_plus - loss_minus) / (step + step);
        }
    }

    Ok(numerical)
}

fn param_shape<F: Scalar, M: Classifier<F>>(model: &M, name: &ParamName) -> Result<Vec<usize>> {
    model
        .params()
        .get(name)
        .map(|view| view.shape().to_vec())
        .ok_or_else(|| NetError::UnknownParameter(name.to_string()))
}

/// Returns the entry's previous value, writing `value` if given.
fn nudge<F: Scalar, M: Classifier<F>>(
    model: &mut M,
    name: &ParamName,
    index: &[usize],
    value: Option<F>,
) -> Result<F> {
    let mut view = model
        .params_mut()
        .get_mut(name)
        .ok_or_else(|| NetError::UnknownParameter(name.to_string()))?;
    let previous = view[index];
    if let Some(value) = value {
        view[index] = value;
    }
    Ok(previous)
}

/// Maximum elementwise relative error `|a - b| / max(1e-8, |a| + |b|)`.
pub fn rel_error<F: Scalar>(a: &ArrayViewD<'_, F>, b: &ArrayViewD<'_, F>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let (x, y) = (x.as_f64(), y.as_f64());
            (x - y).abs() / (x.abs() + y.abs()).max(1e-8)
        })
        .fold(0.0, f64::max)
}

/// Relative error between analytic and numerical gradients, per parameter.
pub fn check_model_gradients<F, M, S, D>(
    model: &mut M,
    inputs: &ArrayBase<S, D>,
    labels: &[usize],
    h: f64,
) -> Result<Vec<(ParamName, f64)>>
where
    F: Scalar,
    M: Classifier<F>,
    S: Data,
    S::Elem: Scalar,
    D: Dimension,
{
    let (_, analytic) = model.train_loss(inputs, labels)?;
    let numerical = eval_numerical_gradient(model, inputs, labels, h)?;

    analytic
        .iter()
        .map(|(name, grad)| {
            let estimate = numerical
                .get(&name)
                .ok_or_else(|| NetError::UnknownParameter(name.to_string()))?;
            Ok((name, rel_error(&grad, &estimate)))
        })
        .collect()
}

/// L2 norm of each gradient tensor
pub fn gradient_norms<F: Scalar>(grads: &Gradients<F>) -> Vec<(ParamName, f64)> {
    grads
        .iter()
        .map(|(name, grad)| {
            let norm = grad.iter().map(|&g| g.as_f64() * g.as_f64()).sum::<f64>().sqrt();
            (name, norm)
        })
        .collect()
}
