use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};

use super::layer::DenseLayer;

pub trait Optimizer {
    /// Called once before the per-layer updates of an optimisation step.
    fn begin_step(&mut self);

    fn update_layer(
        &mut self,
        layer_index: usize,
        weights: &mut Array2<f32>,
        weight_gradients: &Array2<f32>,
        biases: &mut Array1<f32>,
        bias_gradients: &Array1<f32>,
    );

    fn learning_rate(&self) -> f32;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum OptimizerWrapper {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn begin_step(&mut self) {
        match self {
            OptimizerWrapper::Sgd(optimizer) => optimizer.begin_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.begin_step(),
        }
    }

    fn update_layer(
        &mut self,
        layer_index: usize,
        weights: &mut Array2<f32>,
        weight_gradients: &Array2<f32>,
        biases: &mut Array1<f32>,
        bias_gradients: &Array1<f32>,
    ) {
        match self {
            OptimizerWrapper::Sgd(optimizer) => {
                optimizer.update_layer(layer_index, weights, weight_gradients, biases, bias_gradients)
            }
            OptimizerWrapper::Adam(optimizer) => {
                optimizer.update_layer(layer_index, weights, weight_gradients, biases, bias_gradients)
            }
        }
    }

    fn learning_rate(&self) -> f32 {
        match self {
            OptimizerWrapper::Sgd(optimizer) => optimizer.learning_rate(),
            OptimizerWrapper::Adam(optimizer) => optimizer.learning_rate(),
        }
    }
}

/// Plain stochastic gradient descent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Sgd { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn begin_step(&mut self) {}

    fn update_layer(
        &mut self,
        _layer_index: usize,
        weights: &mut Array2<f32>,
        weight_gradients: &Array2<f32>,
        biases: &mut Array1<f32>,
        bias_gradients: &Array1<f32>,
    ) {
        let lr = self.learning_rate;
        weights.zip_mut_with(weight_gradients, |w, &g| *w -= lr * g);
        biases.zip_mut_with(bias_gradients, |b, &g| *b -= lr * g);
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

/// Adam with one pair of moment estimates per layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
    pub t: i32,
}

impl Adam {
    pub fn new(layers: &[DenseLayer], learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            m_weights: layers.iter().map(|l| Array2::zeros(l.weights.dim())).collect(),
            v_weights: layers.iter().map(|l| Array2::zeros(l.weights.dim())).collect(),
            m_biases: layers.iter().map(|l| Array1::zeros(l.biases.dim())).collect(),
            v_biases: layers.iter().map(|l| Array1::zeros(l.biases.dim())).collect(),
            t: 0,
        }
    }

    pub fn with_defaults(layers: &[DenseLayer], learning_rate: f32) -> Self {
        Self::new(layers, learning_rate, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t = self.t.saturating_add(1);
    }

    fn update_layer(
        &mut self,
        layer_index: usize,
        weights: &mut Array2<f32>,
        weight_gradients: &Array2<f32>,
        biases: &mut Array1<f32>,
        bias_gradients: &Array1<f32>,
    ) {
        let (b1, b2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);
        let t = self.t.max(1);
        let correction1 = 1.0 - b1.powi(t);
        let correction2 = 1.0 - b2.powi(t);

        let m = &mut self.m_weights[layer_index];
        let v = &mut self.v_weights[layer_index];
        m.zip_mut_with(weight_gradients, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
        v.zip_mut_with(weight_gradients, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);
        Zip::from(weights).and(&*m).and(&*v).for_each(|w, &m, &v| {
            *w -= lr * (m / correction1) / ((v / correction2).sqrt() + eps);
        });

        let m = &mut self.m_biases[layer_index];
        let v = &mut self.v_biases[layer_index];
        m.zip_mut_with(bias_gradients, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
        v.zip_mut_with(bias_gradients, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);
        Zip::from(biases).and(&*m).and(&*v).for_each(|b, &m, &v| {
            *b -= lr * (m / correction1) / ((v / correction2).sqrt() + eps);
        });
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}
