//! # Value-function approximation
//!
//! The training engine never looks inside the network. It only needs the
//! operations of [`ValueFunction`]: batch prediction, one masked regression
//! step, a hard copy of parameters into another instance, and persistence.
//!
//! [`QNetwork`] is the bundled implementation: a small fully connected
//! network (ReLU hidden layers, linear output with one unit per action)
//! trained with Adam or SGD on the CPU with `ndarray`.
//!
//! ```rust,no_run
//! use carpilot::network::{QNetwork, ValueFunction};
//! use ndarray::array;
//!
//! let network = QNetwork::builder()
//!     .input_size(5)
//!     .hidden_layers(&[10])
//!     .num_actions(3)
//!     .learning_rate(1e-3)
//!     .seed(7)
//!     .build()
//!     .unwrap();
//! let action = network.greedy_action(array![0.0, 0.2, 0.9, 0.2, 0.0].view()).unwrap();
//! assert!(action < 3);
//! ```

pub mod activation;
pub mod layer;
pub mod optimizer;

pub use activation::Activation;
pub use layer::DenseLayer;
pub use optimizer::{Adam, Optimizer, OptimizerWrapper, Sgd};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PilotError, Result};

/// Interface of a trainable action-value function.
pub trait ValueFunction {
    fn input_size(&self) -> usize;

    fn num_actions(&self) -> usize;

    /// Action values for a batch of states, one row per state.
    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// One gradient step on the mean squared error between the predicted
    /// value of each taken action and its target. Returns the loss measured
    /// before the update.
    fn optimize_step(
        &mut self,
        states: ArrayView2<f32>,
        actions: &[usize],
        targets: ArrayView1<f32>,
    ) -> Result<f32>;

    /// Overwrite every parameter of `other` with this instance's values.
    fn clone_weights_into(&self, other: &mut Self) -> Result<()>
    where
        Self: Sized;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>
    where
        Self: Sized;

    fn predict_one(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let values = self.predict(state.insert_axis(Axis(0)))?;
        Ok(values.row(0).to_owned())
    }

    /// Index of the highest-valued action; ties go to the lowest index.
    fn greedy_action(&self, state: ArrayView1<f32>) -> Result<usize> {
        let values = self.predict_one(state)?;
        argmax(values.view())
    }
}

/// Index of the largest element. Fails on empty or non-finite input.
pub fn argmax(values: ArrayView1<f32>) -> Result<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(PilotError::NumericalError(format!(
                "non-finite action value {} at index {}",
                v, i
            )));
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| PilotError::NumericalError("no action values".to_string()))
}

/// Fully connected Q-network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QNetwork {
    layers: Vec<DenseLayer>,
    optimizer: OptimizerWrapper,
}

impl QNetwork {
    pub fn builder() -> QNetworkBuilder {
        QNetworkBuilder::new()
    }

    /// Build from explicit layers, e.g. ones restored elsewhere.
    pub fn from_layers(layers: Vec<DenseLayer>, optimizer: OptimizerWrapper) -> Result<Self> {
        if layers.is_empty() {
            return Err(PilotError::invalid_parameter("layers", "network needs at least one layer"));
        }
        for pair in layers.windows(2) {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(PilotError::dimension_mismatch(
                    format!("layer input of {}", pair[0].output_size()),
                    format!("{}", pair[1].input_size()),
                ));
            }
        }
        Ok(QNetwork { layers, optimizer })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn optimizer(&self) -> &OptimizerWrapper {
        &self.optimizer
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }

    /// True when both networks hold exactly the same parameters.
    pub fn same_parameters(&self, other: &QNetwork) -> bool {
        self.layers.len() == other.layers.len()
            && self
                .layers
                .iter()
                .zip(&other.layers)
                .all(|(a, b)| a.weights == b.weights && a.biases == b.biases)
    }

    fn check_input(&self, states: &ArrayView2<f32>) -> Result<()> {
        if states.ncols() != self.input_size() {
            return Err(PilotError::dimension_mismatch(
                format!("{} state features", self.input_size()),
                format!("{}", states.ncols()),
            ));
        }
        Ok(())
    }
}

impl ValueFunction for QNetwork {
    fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    fn num_actions(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(&states)?;
        let mut output = states.to_owned();
        for layer in &self.layers {
            output = layer.forward_batch(output.view());
        }
        Ok(output)
    }

    fn optimize_step(
        &mut self,
        states: ArrayView2<f32>,
        actions: &[usize],
        targets: ArrayView1<f32>,
    ) -> Result<f32> {
        self.check_input(&states)?;
        let batch_size = states.nrows();
        if batch_size == 0 {
            return Err(PilotError::invalid_parameter("states", "empty batch"));
        }
        if actions.len() != batch_size || targets.len() != batch_size {
            return Err(PilotError::dimension_mismatch(
                format!("{} actions and targets", batch_size),
                format!("{} actions, {} targets", actions.len(), targets.len()),
            ));
        }
        let num_actions = self.num_actions();
        if let Some(&action) = actions.iter().find(|&&a| a >= num_actions) {
            return Err(PilotError::InvalidAction { action, num_actions });
        }

        let mut caches = Vec::with_capacity(self.layers.len());
        let mut output = states.to_owned();
        for layer in &self.layers {
            let (next, cache) = layer.forward_cached(output.view());
            caches.push(cache);
            output = next;
        }

        // Only the taken action contributes to the loss and its gradient.
        let mut errors = Array2::<f32>::zeros(output.dim());
        let mut loss = 0.0;
        for (i, (&action, &target)) in actions.iter().zip(targets.iter()).enumerate() {
            let diff = output[[i, action]] - target;
            loss += diff * diff;
            errors[[i, action]] = 2.0 * diff / batch_size as f32;
        }
        loss /= batch_size as f32;
        if !loss.is_finite() {
            return Err(PilotError::NumericalError(format!("loss diverged to {}", loss)));
        }

        let mut gradients = Vec::with_capacity(self.layers.len());
        for (layer, cache) in self.layers.iter().zip(&caches).rev() {
            let (input_errors, weight_gradients, bias_gradients) = layer.backward(cache, errors);
            gradients.push((weight_gradients, bias_gradients));
            errors = input_errors;
        }
        gradients.reverse();

        self.optimizer.begin_step();
        for (index, (layer, (weight_gradients, bias_gradients))) in
            self.layers.iter_mut().zip(gradients).enumerate()
        {
            self.optimizer.update_layer(
                index,
                &mut layer.weights,
                &weight_gradients,
                &mut layer.biases,
                &bias_gradients,
            );
        }
        Ok(loss)
    }

    fn clone_weights_into(&self, other: &mut Self) -> Result<()> {
        if self.layers.len() != other.layers.len() {
            return Err(PilotError::dimension_mismatch(
                format!("{} layers", self.layers.len()),
                format!("{} layers", other.layers.len()),
            ));
        }
        for (source, target) in self.layers.iter().zip(&other.layers) {
            if source.weights.dim() != target.weights.dim() {
                return Err(PilotError::dimension_mismatch(
                    format!("{:?}", source.weights.dim()),
                    format!("{:?}", target.weights.dim()),
                ));
            }
        }
        for (source, target) in self.layers.iter().zip(other.layers.iter_mut()) {
            target.weights.assign(&source.weights);
            target.biases.assign(&source.biases);
            target.activation = source.activation;
        }
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let serialized = bincode::serialize(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let network: QNetwork = bincode::deserialize(&data)?;
        QNetwork::from_layers(network.layers, network.optimizer)
    }
}

/// Which optimiser a [`QNetworkBuilder`] attaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

/// Builder pattern for QNetwork
pub struct QNetworkBuilder {
    input_size: usize,
    hidden_layers: Vec<usize>,
    num_actions: usize,
    hidden_activation: Activation,
    learning_rate: f32,
    optimizer: OptimizerKind,
    seed: Option<u64>,
}

impl QNetworkBuilder {
    pub fn new() -> Self {
        QNetworkBuilder {
            input_size: 0,
            hidden_layers: vec![10],
            num_actions: 0,
            hidden_activation: Activation::Relu,
            learning_rate: 1e-3,
            optimizer: OptimizerKind::Adam,
            seed: None,
        }
    }

    pub fn input_size(mut self, size: usize) -> Self {
        self.input_size = size;
        self
    }

    pub fn hidden_layers(mut self, sizes: &[usize]) -> Self {
        self.hidden_layers = sizes.to_vec();
        self
    }

    pub fn num_actions(mut self, num_actions: usize) -> Self {
        self.num_actions = num_actions;
        self
    }

    pub fn hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<QNetwork> {
        if self.input_size == 0 || self.num_actions == 0 {
            return Err(PilotError::invalid_parameter(
                "layer_sizes",
                "input size and number of actions must be positive",
            ));
        }
        if self.hidden_layers.iter().any(|&s| s == 0) {
            return Err(PilotError::invalid_parameter(
                "hidden_layers",
                "hidden layer sizes must be positive",
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PilotError::invalid_parameter(
                "learning_rate",
                "must be positive",
            ));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut sizes = vec![self.input_size];
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(self.num_actions);

        let layers: Vec<DenseLayer> = sizes
            .windows(2)
            .enumerate()
            .map(|(i, window)| {
                let activation = if i == sizes.len() - 2 {
                    Activation::Linear
                } else {
                    self.hidden_activation
                };
                DenseLayer::new(window[0], window[1], activation, &mut rng)
            })
            .collect();

        let optimizer = match self.optimizer {
            OptimizerKind::Adam => OptimizerWrapper::Adam(Adam::with_defaults(&layers, self.learning_rate)),
            OptimizerKind::Sgd => OptimizerWrapper::Sgd(Sgd::new(self.learning_rate)),
        };
        QNetwork::from_layers(layers, optimizer)
    }
}

impl Default for QNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
