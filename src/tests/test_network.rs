use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{assert_all_close, assert_gradients_match, random_matrix};
use crate::layers::Dropout;
use crate::loss::softmax_loss;
use crate::network::{
    Classifier, FullyConnectedNet, HiddenBlock, LossOutput, ParamKind, ParamName, TwoLayerNet,
};
use crate::types::Mode;

fn names(list: &[&str]) -> Vec<ParamName> {
    list.iter().map(|name| name.parse().unwrap()).collect()
}

fn labels(n: usize, num_classes: usize) -> Vec<usize> {
    (0..n).map(|i| i % num_classes).collect()
}

fn two_layer(reg: f64, seed: u64) -> TwoLayerNet<f64> {
    TwoLayerNet::with_rng(5, 10, 3, 0.3, reg, &mut StdRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn test_two_layer_net_creation() {
    let net = TwoLayerNet::<f64>::new(4, 6, 3, 1e-3, 0.1).unwrap();

    assert_eq!(net.params().names(), names(&["W1", "b1", "W2", "b2"]));
    assert_eq!(net.params().by_name("W1").unwrap().shape(), [4, 6]);
    assert_eq!(net.params().by_name("b1").unwrap().shape(), [6]);
    assert_eq!(net.params().by_name("W2").unwrap().shape(), [6, 3]);
    assert_eq!(net.params().by_name("b2").unwrap().shape(), [3]);
    assert!(net.params().by_name("b1").unwrap().iter().all(|&b| b == 0.0));
    assert_eq!(net.hidden_dim(), 6);
    assert_eq!(net.input_dim(), 4);
    assert_eq!(net.num_classes(), 3);
}

#[test]
fn test_two_layer_net_zero_weights_uniform_loss() {
    let mut net = TwoLayerNet::<f64>::new(4, 5, 3, 0.0, 0.0).unwrap();
    let x = random_matrix((3, 4), 1);
    let y = [0, 1, 2];

    let scores = net.scores(&x).unwrap();
    assert_eq!(scores.dim(), (3, 3));
    assert!(scores.iter().all(|&s| s == 0.0));

    let (loss, _) = net.train_loss(&x, &y).unwrap();
    assert!((loss - 3.0_f64.ln()).abs() < 1e-12);
}

#[test]
fn test_two_layer_net_structured_input() {
    let mut net = TwoLayerNet::<f64>::new(8, 5, 4, 0.1, 0.0).unwrap();
    let x = Array3::<f64>::ones((6, 2, 4));

    let scores = net.scores(&x).unwrap();
    assert_eq!(scores.dim(), (6, 4));
}

#[test]
fn test_two_layer_net_gradients() {
    let x = random_matrix((4, 5), 2);
    let y = labels(4, 3);

    for reg in [0.0, 0.7] {
        let mut net = two_layer(reg, 3);
        assert_gradients_match(&mut net, &x, &y);
    }
}

/// `0.5 * sum_i ||W_i||^2` computed entry by entry from the named weights.
fn half_squared_weights<M: Classifier<f64>>(model: &M) -> f64 {
    (1..=model.params().num_layers())
        .map(|layer| {
            let weights = model.params().by_name(&format!("W{}", layer)).unwrap();
            0.5 * weights.iter().map(|w| w * w).sum::<f64>()
        })
        .sum()
}

/// Raise `reg` step by step and check the loss against a hand-computed L2 term,
/// the weight gradients against `reg * W`, and every other gradient for no change.
fn assert_regularizes_all_weights<M: Classifier<f64>>(
    model: &mut M,
    set_reg: impl Fn(&mut M, f64),
    x: &Array2<f64>,
    y: &[usize],
) {
    set_reg(model, 0.0);
    let (data_loss, data_grads) = model.train_loss(x, y).unwrap();
    let penalty = half_squared_weights(model);
    assert!(penalty > 0.0);

    let mut previous = data_loss;
    for reg in [0.1, 0.5, 2.0] {
        set_reg(model, reg);
        let (loss, grads) = model.train_loss(x, y).unwrap();
        assert!(loss > previous, "loss did not grow at reg {}", reg);
        assert!((loss - data_loss - reg * penalty).abs() < 1e-10);

        for (name, grad) in grads.iter() {
            let unregularized = data_grads.get(&name).unwrap();
            match name.kind {
                ParamKind::Weight => {
                    let weights = model.params().get(&name).unwrap();
                    let expected = &unregularized + &(&weights * reg);
                    assert_all_close(grad, expected.view(), &name.to_string());
                }
                _ => assert_eq!(grad, unregularized, "{} changed with reg", name),
            }
        }
        previous = loss;
    }
}

#[test]
fn test_two_layer_net_regularization() {
    let mut net = two_layer(0.0, 4);
    let x = random_matrix((4, 5), 5);
    let y = labels(4, 3);

    assert_regularizes_all_weights(&mut net, |net, reg| net.set_reg(reg).unwrap(), &x, &y);
}

#[test]
fn test_fully_connected_regularization() {
    let mut net = FullyConnectedNet::<f64>::builder(&[6, 5])
        .input_dim(4)
        .num_classes(3)
        .batchnorm(true)
        .weight_scale(0.3)
        .init_seed(24)
        .build()
        .unwrap();
    let x = random_matrix((6, 4), 25);
    let y = labels(6, 3);

    // Final-layer weights carry part of the penalty too
    let output = net.params().by_name("W3").unwrap();
    assert!(output.iter().any(|&w| w != 0.0));

    assert_regularizes_all_weights(&mut net, |net, reg| net.set_reg(reg).unwrap(), &x, &y);
}

#[test]
fn test_loss_dispatches_on_labels() {
    let mut net = two_layer(0.1, 6);
    let x = random_matrix((2, 5), 7);

    match net.loss(&x, None).unwrap() {
        LossOutput::Scores(scores) => assert_eq!(scores.dim(), (2, 3)),
        LossOutput::Training { .. } => panic!("expected scores without labels"),
    }

    let (loss, grads) = net.loss(&x, Some(&[1, 2][..])).unwrap().training().unwrap();
    assert!(loss > 0.0);
    assert!(grads.same_structure(net.params()));
}

#[test]
fn test_fully_connected_param_names() {
    let net = FullyConnectedNet::<f64>::builder(&[6, 7])
        .input_dim(5)
        .num_classes(4)
        .batchnorm(true)
        .build()
        .unwrap();

    assert_eq!(net.num_layers(), 3);
    assert_eq!(
        net.params().names(),
        names(&["W1", "b1", "gamma1", "beta1", "W2", "b2", "gamma2", "beta2", "W3", "b3"])
    );
    assert_eq!(net.params().by_name("W2").unwrap().shape(), [6, 7]);
    assert_eq!(net.params().by_name("W3").unwrap().shape(), [7, 4]);
    assert!(net.params().by_name("gamma2").unwrap().iter().all(|&g| g == 1.0));
    assert!(net.params().by_name("beta1").unwrap().iter().all(|&b| b == 0.0));
    assert!(net.params().by_name("gamma3").is_err());
    assert!(net.batch_norm(1).is_some());
    assert!(net.batch_norm(3).is_none());

    // 5*6 + 3*6, 6*7 + 3*7, 7*4 + 4
    assert_eq!(net.params().num_parameters(), 143);
}

#[test]
fn test_fully_connected_scores_and_gradient_shapes() {
    let mut net = FullyConnectedNet::<f64>::builder(&[10, 10, 10])
        .input_dim(6)
        .num_classes(5)
        .dropout(0.5)
        .batchnorm(true)
        .build()
        .unwrap();
    let x = random_matrix((7, 6), 8);

    assert_eq!(net.scores(&x).unwrap().dim(), (7, 5));

    let (loss, grads) = net.train_loss(&x, &labels(7, 5)).unwrap();
    assert!(loss >= 0.0);
    assert_eq!(grads.names(), net.params().names());
    for (name, grad) in grads.iter() {
        assert_eq!(grad.shape(), net.params().get(&name).unwrap().shape(), "{}", name);
    }
}

#[test]
fn test_fully_connected_gradients() {
    let x = random_matrix((2, 15), 9);
    let y = [3, 7];

    for reg in [0.0, 3.14] {
        let mut net = FullyConnectedNet::<f64>::builder(&[20, 30])
            .input_dim(15)
            .num_classes(10)
            .reg(reg)
            .weight_scale(5e-2)
            .init_seed(10)
            .build()
            .unwrap();
        assert_gradients_match(&mut net, &x, &y);
    }
}

#[test]
fn test_fully_connected_batchnorm_gradients() {
    let x = random_matrix((4, 6), 11);
    let y = labels(4, 3);

    for reg in [0.0, 0.5] {
        let mut net = FullyConnectedNet::<f64>::builder(&[8, 7])
            .input_dim(6)
            .num_classes(3)
            .batchnorm(true)
            .reg(reg)
            .weight_scale(0.2)
            .init_seed(12)
            .build()
            .unwrap();
        assert_gradients_match(&mut net, &x, &y);
    }
}

#[test]
fn test_fully_connected_dropout_gradients() {
    let x = random_matrix((3, 6), 13);
    let y = labels(3, 4);

    for use_batchnorm in [false, true] {
        let mut net = FullyConnectedNet::<f64>::builder(&[9, 9])
            .input_dim(6)
            .num_classes(4)
            .dropout(0.25)
            .batchnorm(use_batchnorm)
            .reg(0.1)
            .weight_scale(0.2)
            .seed(123)
            .init_seed(14)
            .build()
            .unwrap();
        assert_gradients_match(&mut net, &x, &y);
    }
}

#[test]
fn test_fully_connected_single_layer() {
    let mut net = FullyConnectedNet::<f64>::builder(&[])
        .input_dim(4)
        .num_classes(3)
        .weight_scale(0.5)
        .init_seed(15)
        .build()
        .unwrap();
    let x = random_matrix((5, 4), 16);
    let y = [0, 1, 2, 2, 1];

    assert_eq!(net.num_layers(), 1);
    assert!(net.blocks().is_empty());
    assert_eq!(net.params().names(), names(&["W1", "b1"]));

    let layer = net.params().layer(1).unwrap().clone();
    let expected = x.dot(&layer.weights) + &layer.biases;

    // A single affine layer: negative scores survive, nothing is rectified
    let scores = net.scores(&x).unwrap();
    assert_all_close(scores.view().into_dyn(), expected.view().into_dyn(), "scores");

    let (expected_loss, dscores) = softmax_loss(&expected, &y);
    let (loss, grads) = net.train_loss(&x, &y).unwrap();
    assert!((loss - expected_loss).abs() < 1e-12);

    let expected_dw = x.t().dot(&dscores);
    assert_all_close(grads.by_name("W1").unwrap(), expected_dw.view().into_dyn(), "W1");
    assert_all_close(
        grads.by_name("b1").unwrap(),
        dscores.sum_axis(Axis(0)).view().into_dyn(),
        "b1",
    );
}

#[test]
fn test_fully_connected_zero_dropout_is_plain() {
    let mut net = FullyConnectedNet::<f64>::builder(&[6])
        .input_dim(4)
        .num_classes(3)
        .dropout(0.0)
        .weight_scale(0.5)
        .init_seed(17)
        .build()
        .unwrap();
    assert!(!net.uses_dropout());
    assert_eq!(net.blocks()[0], HiddenBlock::AffineRelu);
    assert!(net.blocks()[0].dropout().is_none());

    let x = random_matrix((5, 4), 18);
    let first = net.params().layer(1).unwrap().clone();
    let second = net.params().layer(2).unwrap().clone();
    let hidden = (x.dot(&first.weights) + &first.biases).mapv(|v| v.max(0.0));
    let expected = hidden.dot(&second.weights) + &second.biases;

    let train = net.forward(&x, Mode::Train).unwrap();
    let test = net.forward(&x, Mode::Test).unwrap();
    assert_all_close(train.view().into_dyn(), expected.view().into_dyn(), "train scores");
    assert_all_close(test.view().into_dyn(), expected.view().into_dyn(), "test scores");
}

#[test]
fn test_fully_connected_seeded_dropout_is_reproducible() {
    let build = |seed: u64| {
        FullyConnectedNet::<f64>::builder(&[12, 12])
            .input_dim(5)
            .num_classes(3)
            .dropout(0.5)
            .seed(seed)
            .init_seed(19)
            .build()
            .unwrap()
    };
    let x = random_matrix((6, 5), 20);
    let y = labels(6, 3);

    let mut first = build(42);
    let mut second = build(42);
    for block in first.blocks() {
        assert_eq!(block.dropout(), Some(&Dropout { p: 0.5, seed: Some(42) }));
    }
    assert_eq!(first.params(), second.params());

    let (loss_a, grads_a) = first.train_loss(&x, &y).unwrap();
    let (loss_b, grads_b) = second.train_loss(&x, &y).unwrap();
    assert_eq!(loss_a, loss_b);
    assert_eq!(grads_a, grads_b);

    let mut other = build(43);
    let (loss_c, _) = other.train_loss(&x, &y).unwrap();
    assert_ne!(loss_a, loss_c);

    // Inference ignores dropout entirely
    assert_eq!(first.scores(&x).unwrap(), other.scores(&x).unwrap());
}

#[test]
fn test_fully_connected_batchnorm_inference_uses_running_stats() {
    let mut net = FullyConnectedNet::<f64>::builder(&[6])
        .input_dim(4)
        .num_classes(3)
        .batchnorm(true)
        .weight_scale(0.5)
        .init_seed(21)
        .build()
        .unwrap();
    let x = random_matrix((8, 4), 22) + 1.5;

    let train_scores = net.forward(&x, Mode::Train).unwrap();
    let snapshot = net.batch_norm(1).unwrap().clone();
    let early_test = net.forward(&x, Mode::Test).unwrap();
    assert_eq!(net.batch_norm(1).unwrap(), &snapshot);

    // After one step the running statistics are still far from the batch's own
    let gap = (&train_scores - &early_test).mapv(f64::abs).fold(0.0, |m: f64, &v| m.max(v));
    assert!(gap > 1e-3);

    for _ in 0..300 {
        net.forward(&x, Mode::Train).unwrap();
    }

    let layer = net.params().layer(1).unwrap().clone();
    let affine = x.dot(&layer.weights) + &layer.biases;
    let batch_mean = affine.mean_axis(Axis(0)).unwrap();
    let running_mean = net.batch_norm(1).unwrap().running_mean().unwrap().clone();
    assert_all_close(running_mean.view().into_dyn(), batch_mean.view().into_dyn(), "running mean");

    let late_test = net.forward(&x, Mode::Test).unwrap();
    assert_all_close(late_test.view().into_dyn(), train_scores.view().into_dyn(), "scores");

    net.reset_running_stats();
    assert!(net.batch_norm(1).unwrap().running_mean().is_none());
}

#[test]
fn test_fully_connected_single_precision() {
    let mut net = FullyConnectedNet::<f32>::builder(&[8])
        .input_dim(3)
        .num_classes(2)
        .batchnorm(true)
        .dropout(0.1)
        .build()
        .unwrap();
    let x = random_matrix((4, 3), 23);

    let scores: Array2<f32> = net.scores(&x).unwrap();
    assert_eq!(scores.dim(), (4, 2));

    let (loss, grads) = net.train_loss(&x, &[0, 1, 1, 0]).unwrap();
    assert!(loss.is_finite() && loss >= 0.0);
    assert!(grads.same_structure(net.params()));
}
