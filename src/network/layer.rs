use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::activation::Activation;

/// Values remembered by a training forward pass for backpropagation.
pub(crate) struct LayerCache {
    pub inputs: Array2<f32>,
    pub pre_activation: Array2<f32>,
}

/// A fully connected layer. `weights` is `input_size x output_size`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    /// He-uniform init for rectifiers, Xavier-uniform otherwise. Biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let limit = match activation {
            Activation::Relu | Activation::LeakyRelu { .. } => (6.0 / input_size as f32).sqrt(),
            Activation::Linear | Activation::Tanh => {
                (6.0 / (input_size + output_size) as f32).sqrt()
            }
        };
        let weights = Array2::random_using((input_size, output_size), Uniform::new(-limit, limit), rng);
        DenseLayer {
            weights,
            biases: Array1::zeros(output_size),
            activation,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn forward_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    pub(crate) fn forward_cached(&self, inputs: ArrayView2<f32>) -> (Array2<f32>, LayerCache) {
        let pre_activation = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        let mut outputs = pre_activation.clone();
        self.activation.apply_batch(&mut outputs);
        let cache = LayerCache {
            inputs: inputs.to_owned(),
            pre_activation,
        };
        (outputs, cache)
    }

    /// Returns `(error for the previous layer, weight gradients, bias gradients)`.
    pub(crate) fn backward(
        &self,
        cache: &LayerCache,
        output_errors: Array2<f32>,
    ) -> (Array2<f32>, Array2<f32>, Array1<f32>) {
        let adjusted = output_errors * &self.activation.derivative_batch(cache.pre_activation.view());
        let weight_gradients = cache.inputs.t().dot(&adjusted);
        let bias_gradients = adjusted.sum_axis(Axis(0));
        let input_errors = adjusted.dot(&self.weights.t());
        (input_errors, weight_gradients, bias_gradients)
    }
}
