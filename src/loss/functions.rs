use ndarray::{Array2, Axis};

use crate::types::Scalar;

/// Softmax cross-entropy loss averaged over the batch.
///
/// Returns the loss together with its gradient w.r.t. `scores`. Rows are
/// shifted by their maximum before exponentiating so large scores do not
/// overflow.
///
/// `labels` must hold one class index per row of `scores`, each smaller than
/// the number of columns; callers validate this before getting here.
pub fn softmax_loss<F: Scalar>(scores: &Array2<F>, labels: &[usize]) -> (F, Array2<F>) {
    let batch_size = F::cast_from(scores.nrows() as f64);
    let mut dscores = scores.to_owned();
    let mut loss = F::zero();

    for (mut row, &label) in dscores.axis_iter_mut(Axis(0)).zip(labels) {
        let max = row.fold(F::neg_infinity(), |m, &v| m.max(v));
        row.mapv_inplace(|v| v - max);
        let log_sum = row.mapv(F::exp).sum().ln();
        loss -= row[label] - log_sum;

        // Row becomes softmax probabilities, minus one at the true class
        row.mapv_inplace(|v| (v - log_sum).exp());
        row[label] -= F::one();
    }

    dscores /= batch_size;
    (loss / batch_size, dscores)
}
