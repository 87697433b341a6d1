use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::network::{Activation, DenseLayer};

#[test]
fn test_dense_layer_shapes() {
    let mut rng = StdRng::seed_from_u64(1);
    let layer = DenseLayer::new(3, 4, Activation::Relu, &mut rng);

    assert_eq!(layer.weights.shape(), [3, 4]);
    assert_eq!(layer.biases.shape(), [4]);
    assert_eq!(layer.input_size(), 3);
    assert_eq!(layer.output_size(), 4);
    assert!(layer.biases.iter().all(|&b| b == 0.0));
}

#[test]
fn test_he_uniform_bounds() {
    let mut rng = StdRng::seed_from_u64(2);
    let layer = DenseLayer::new(6, 50, Activation::Relu, &mut rng);
    let limit = (6.0f32 / 6.0).sqrt();
    assert!(layer.weights.iter().all(|&w| w.abs() <= limit));
}

#[test]
fn test_forward_batch_linear() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut layer = DenseLayer::new(2, 2, Activation::Linear, &mut rng);
    layer.weights = array![[1.0, 2.0], [3.0, 4.0]];
    layer.biases = array![0.5, -0.5];

    let output = layer.forward_batch(array![[1.0, 1.0], [0.0, 2.0]].view());
    assert_eq!(output, array![[4.5, 5.5], [6.5, 7.5]]);
}

#[test]
fn test_backward_matches_finite_difference() {
    let mut rng = StdRng::seed_from_u64(4);
    let layer = DenseLayer::new(3, 2, Activation::Tanh, &mut rng);
    let inputs = array![[0.3, -0.2, 0.8]];

    // Loss is the sum of outputs, so the output error is all ones.
    let (_, cache) = layer.forward_cached(inputs.view());
    let (_, weight_gradients, _) = layer.backward(&cache, Array2::ones((1, 2)));

    let h = 1e-3;
    for i in 0..3 {
        for j in 0..2 {
            let mut plus = layer.clone();
            plus.weights[[i, j]] += h;
            let mut minus = layer.clone();
            minus.weights[[i, j]] -= h;
            let numeric = (plus.forward_batch(inputs.view()).sum()
                - minus.forward_batch(inputs.view()).sum())
                / (2.0 * h);
            assert!((numeric - weight_gradients[[i, j]]).abs() < 1e-2);
        }
    }
}
