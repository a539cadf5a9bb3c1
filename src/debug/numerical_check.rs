use crate::network::{Gradients, ParamName, ParamStore};
use crate::types::Scalar;

/// Types of numerical issues
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalIssue {
    NaN { count: usize },
    Infinity { count: usize },
    /// Finite values whose magnitude exceeds the threshold
    Exploding { count: usize },
}

fn scan<F: Scalar>(store: &ParamStore<F>, threshold: f64, what: &str) -> Vec<(ParamName, NumericalIssue)> {
    let mut issues = Vec::new();

    for (name, values) in store.iter() {
        let mut nan_count = 0;
        let mut inf_count = 0;
        let mut exploding_count = 0;

        for &value in values.iter() {
            if value.is_nan() {
                nan_count += 1;
            } else if value.is_infinite() {
                inf_count += 1;
            } else if value.as_f64().abs() > threshold {
                exploding_count += 1;
            }
        }

        if nan_count > 0 {
            log::warn!("{}: found {} NaN values in {}", name, nan_count, what);
            issues.push((name, NumericalIssue::NaN { count: nan_count }));
        }
        if inf_count > 0 {
            log::warn!("{}: found {} infinite values in {}", name, inf_count, what);
            issues.push((name, NumericalIssue::Infinity { count: inf_count }));
        }
        if exploding_count > 0 {
            log::warn!("{}: found {} values above {} in {}", name, exploding_count, threshold, what);
            issues.push((name, NumericalIssue::Exploding { count: exploding_count }));
        }
    }

    issues
}

/// Check gradients for NaN, infinite, or exploding entries
pub fn check_gradients<F: Scalar>(grads: &Gradients<F>, threshold: f64) -> Vec<(ParamName, NumericalIssue)> {
    scan(grads, threshold, "gradients")
}

/// Check parameters for NaN, infinite, or exploding entries
pub fn check_params<F: Scalar>(params: &ParamStore<F>, threshold: f64) -> Vec<(ParamName, NumericalIssue)> {
    scan(params, threshold, "parameters")
}
