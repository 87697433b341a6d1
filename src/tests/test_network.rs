use ndarray::{array, Array2};

use crate::error::PilotError;
use crate::network::{argmax, OptimizerKind, QNetwork, ValueFunction};

fn network(seed: u64, optimizer: OptimizerKind) -> QNetwork {
    QNetwork::builder()
        .input_size(3)
        .hidden_layers(&[8])
        .num_actions(3)
        .learning_rate(1e-2)
        .optimizer(optimizer)
        .seed(seed)
        .build()
        .unwrap()
}

#[test]
fn test_builder_shapes() {
    let network = network(1, OptimizerKind::Adam);
    assert_eq!(network.layers().len(), 2);
    assert_eq!(network.layers()[0].weights.shape(), [3, 8]);
    assert_eq!(network.layers()[1].weights.shape(), [8, 3]);
    assert_eq!(network.input_size(), 3);
    assert_eq!(network.num_actions(), 3);
    assert_eq!(network.parameter_count(), 3 * 8 + 8 + 8 * 3 + 3);
}

#[test]
fn test_builder_rejects_zero_sizes() {
    let result = QNetwork::builder().input_size(0).num_actions(3).build();
    assert!(matches!(result, Err(PilotError::InvalidParameter { .. })));
}

#[test]
fn test_same_seed_same_parameters() {
    assert!(network(5, OptimizerKind::Adam).same_parameters(&network(5, OptimizerKind::Adam)));
    assert!(!network(5, OptimizerKind::Adam).same_parameters(&network(6, OptimizerKind::Adam)));
}

#[test]
fn test_predict_shape_and_input_check() {
    let network = network(1, OptimizerKind::Adam);
    let values = network.predict(Array2::zeros((4, 3)).view()).unwrap();
    assert_eq!(values.shape(), [4, 3]);

    let result = network.predict(Array2::zeros((4, 2)).view());
    assert!(matches!(result, Err(PilotError::DimensionMismatch { .. })));
}

#[test]
fn test_optimize_step_reduces_loss() {
    let mut network = network(2, OptimizerKind::Adam);
    let states = array![[0.1, 0.5, -0.3], [0.9, -0.1, 0.2], [-0.4, 0.3, 0.7]];
    let actions = [0, 2, 1];
    let targets = array![1.0, -0.5, 0.25];

    let first = network.optimize_step(states.view(), &actions, targets.view()).unwrap();
    let mut last = first;
    for _ in 0..300 {
        last = network.optimize_step(states.view(), &actions, targets.view()).unwrap();
    }
    assert!(last < first * 0.5, "loss went from {} to {}", first, last);
}

#[test]
fn test_untaken_actions_get_no_output_gradient() {
    let mut network = network(3, OptimizerKind::Sgd);
    let before = network.layers()[1].clone();
    let states = array![[0.2, 0.4, 0.6], [0.6, 0.4, 0.2]];

    network
        .optimize_step(states.view(), &[1, 1], array![5.0, 5.0].view())
        .unwrap();

    let after = &network.layers()[1];
    for action in [0, 2] {
        assert_eq!(after.weights.column(action), before.weights.column(action));
        assert_eq!(after.biases[action], before.biases[action]);
    }
    assert_ne!(after.biases[1], before.biases[1]);
}

#[test]
fn test_optimize_step_validates_batch() {
    let mut network = network(1, OptimizerKind::Adam);
    let states = Array2::zeros((2, 3));

    let mismatched = network.optimize_step(states.view(), &[0], array![1.0, 1.0].view());
    assert!(matches!(mismatched, Err(PilotError::DimensionMismatch { .. })));

    let bad_action = network.optimize_step(states.view(), &[0, 3], array![1.0, 1.0].view());
    assert!(matches!(
        bad_action,
        Err(PilotError::InvalidAction { action: 3, num_actions: 3 })
    ));
}

#[test]
fn test_non_finite_loss_is_an_error() {
    let mut network = network(1, OptimizerKind::Adam);
    let states = Array2::zeros((1, 3));
    let result = network.optimize_step(states.view(), &[0], array![f32::NAN].view());
    assert!(matches!(result, Err(PilotError::NumericalError(_))));
}

#[test]
fn test_clone_weights_into_then_diverge() {
    let mut online = network(1, OptimizerKind::Adam);
    let mut target = network(2, OptimizerKind::Adam);
    assert!(!online.same_parameters(&target));

    online.clone_weights_into(&mut target).unwrap();
    assert!(online.same_parameters(&target));

    let states = array![[0.3, 0.3, 0.3]];
    online
        .optimize_step(states.view(), &[0], array![10.0].view())
        .unwrap();
    assert!(!online.same_parameters(&target));
}

#[test]
fn test_clone_weights_into_shape_mismatch() {
    let online = network(1, OptimizerKind::Adam);
    let mut other = QNetwork::builder()
        .input_size(3)
        .hidden_layers(&[4])
        .num_actions(3)
        .build()
        .unwrap();
    assert!(online.clone_weights_into(&mut other).is_err());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("dqn.bin");
    let network = network(9, OptimizerKind::Adam);

    network.save(&path).unwrap();
    let loaded = QNetwork::load(&path).unwrap();
    assert!(network.same_parameters(&loaded));

    let state = array![0.1, 0.2, 0.3];
    assert_eq!(
        network.predict_one(state.view()).unwrap(),
        loaded.predict_one(state.view()).unwrap()
    );
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = QNetwork::load(&dir.path().join("missing.bin"));
    assert!(matches!(result, Err(PilotError::IoError(_))));
}

#[test]
fn test_argmax_first_max_wins() {
    assert_eq!(argmax(array![0.5, 2.0, 2.0, -1.0].view()).unwrap(), 1);
    assert_eq!(argmax(array![-3.0].view()).unwrap(), 0);
    assert!(argmax(array![0.0, f32::NAN].view()).is_err());
    assert!(argmax(ndarray::Array1::<f32>::zeros(0).view()).is_err());
}
