pub mod test_network;

use ndarray::{Array2, ArrayViewD};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::debug::eval_numerical_gradient;
use crate::network::Classifier;

/// Standard normal matrix that is the same on every run.
pub fn random_matrix(shape: (usize, usize), seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::random_using(shape, StandardNormal, &mut rng)
}

/// Central-difference gradient of a scalar function of a matrix.
pub fn numeric_gradient<G>(mut f: G, x: &Array2<f64>, h: f64) -> Array2<f64>
where
    G: FnMut(&Array2<f64>) -> f64,
{
    let mut grad = Array2::zeros(x.dim());
    let mut perturbed = x.clone();
    for ((i, j), g) in grad.indexed_iter_mut() {
        let original = perturbed[[i, j]];
        perturbed[[i, j]] = original + h;
        let plus = f(&perturbed);
        perturbed[[i, j]] = original - h;
        let minus = f(&perturbed);
        perturbed[[i, j]] = original;
        *g = (plus - minus) / (2.0 * h);
    }
    grad
}

/// Entrywise `|a - b| <= 1e-7 + 1e-5 * (|a| + |b|)`.
///
/// The absolute slack covers gradients that are zero analytically but pick up
/// rounding noise numerically, e.g. the bias in front of a batchnorm layer.
pub fn assert_all_close(analytic: ArrayViewD<'_, f64>, numerical: ArrayViewD<'_, f64>, what: &str) {
    assert_eq!(analytic.shape(), numerical.shape(), "{}: shape mismatch", what);
    for (&a, &n) in analytic.iter().zip(numerical.iter()) {
        assert!(
            (a - n).abs() <= 1e-7 + 1e-5 * (a.abs() + n.abs()),
            "{}: analytic {} vs numerical {}",
            what,
            a,
            n
        );
    }
}

/// Compare every analytic gradient of `model` with a central-difference estimate.
pub fn assert_gradients_match<M: Classifier<f64>>(model: &mut M, x: &Array2<f64>, y: &[usize]) {
    let (_, analytic) = model.train_loss(x, y).unwrap();
    let numerical = eval_numerical_gradient(model, x, y, 1e-5).unwrap();
    assert!(analytic.same_structure(&numerical));
    for (name, grad) in analytic.iter() {
        assert_all_close(grad, numerical.get(&name).unwrap(), &name.to_string());
    }
}
