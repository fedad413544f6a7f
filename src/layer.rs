//! Layers with hand-written forward and backward passes.
//!
//! Every layer remembers the input of its most recent `forward` call so that the
//! following `backward` can use it. `backward` consumes that cache. Calling
//! `forward` a second time before `backward` overwrites it, so a single layer
//! must never be shared by interleaved batches.

use ndarray::prelude::*;
use ndarray::Zip;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{Error, Result};

/// Forward/backward contract shared by all layer variants.
pub trait Layer {
    /// Caches `input` and returns the layer output.
    fn forward(&mut self, input: &ArrayView2<f64>) -> Array2<f64>;

    /// Takes the gradient w.r.t. this layer's output and returns the gradient
    /// w.r.t. its input, updating any parameters with plain SGD on the way.
    fn backward(&mut self, grad: &ArrayView2<f64>, learning_rate: f64) -> Result<Array2<f64>>;
}

fn missing_cache(layer: &str) -> Error {
    Error::Shape(format!("{} backward called without a cached forward input", layer))
}

/// `ln(1 + e^z)` without overflowing for large `z`.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// `e^z / (1 + e^z)`, split by sign so neither branch overflows.
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

fn softmax(z: &ArrayView2<f64>) -> Array2<f64> {
    let max = z.map_axis(Axis(1), |row| row.fold(f64::NEG_INFINITY, |a, &b| a.max(b)));
    let mut ez = z - &max.insert_axis(Axis(1));
    ez.mapv_inplace(f64::exp);
    let sum = ez.sum_axis(Axis(1)).insert_axis(Axis(1));
    ez / &sum
}

/// Fully connected layer without bias: `output = input . weights`.
#[derive(Debug, Clone)]
pub struct Dense {
    weights: Array2<f64>,
    input: Option<Array2<f64>>,
}

impl Dense {
    /// He initialization: standard normal samples scaled by `sqrt(2 / input_size)`.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let scale = (2.0 / input_size as f64).sqrt();
        let weights = Array::from_shape_simple_fn((input_size, output_size), || {
            scale * rng.sample::<f64, _>(StandardNormal)
        });
        Self::from_weights(weights)
    }

    pub fn from_weights(weights: Array2<f64>) -> Self {
        Self { weights, input: None }
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn apply(&self, input: &ArrayView2<f64>) -> Array2<f64> {
        input.dot(&self.weights)
    }
}

impl Layer for Dense {
    fn forward(&mut self, input: &ArrayView2<f64>) -> Array2<f64> {
        self.input = Some(input.to_owned());
        self.apply(input)
    }

    fn backward(&mut self, grad: &ArrayView2<f64>, learning_rate: f64) -> Result<Array2<f64>> {
        let input = self.input.take().ok_or_else(|| missing_cache("dense"))?;
        if grad.dim() != (input.nrows(), self.output_size()) {
            return Err(Error::Shape(format!(
                "dense backward got gradient {:?}, expected ({}, {}) for the cached batch",
                grad.dim(),
                input.nrows(),
                self.output_size()
            )));
        }
        // dW = (grad^T . input)^T, same shape as the weights
        let dw = grad.t().dot(&input).reversed_axes();
        // the input gradient uses the weights from before this step's update
        let dz = grad.dot(&self.weights.t());
        Zip::from(&mut self.weights)
            .and(&dw)
            .par_for_each(|w, &d| *w -= d * learning_rate);
        Ok(dz)
    }
}

/// Elementwise `ln(1 + e^z)`.
#[derive(Debug, Clone, Default)]
pub struct Softplus {
    input: Option<Array2<f64>>,
}

impl Softplus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, z: &ArrayView2<f64>) -> Array2<f64> {
        z.mapv(softplus)
    }
}

impl Layer for Softplus {
    fn forward(&mut self, z: &ArrayView2<f64>) -> Array2<f64> {
        self.input = Some(z.to_owned());
        self.apply(z)
    }

    fn backward(&mut self, grad: &ArrayView2<f64>, _learning_rate: f64) -> Result<Array2<f64>> {
        let z = self.input.take().ok_or_else(|| missing_cache("softplus"))?;
        if grad.dim() != z.dim() {
            return Err(Error::Shape(format!(
                "softplus backward got gradient {:?}, expected {:?}",
                grad.dim(),
                z.dim()
            )));
        }
        Ok(z.mapv(sigmoid) * grad)
    }
}

/// Row-wise softmax.
///
/// `backward` is the identity. That is only correct when the caller hands it
/// `output - target` (the squared-error gradient formed in the training loop);
/// any other loss needs the full softmax Jacobian here instead.
#[derive(Debug, Clone, Default)]
pub struct Softmax {
    input: Option<Array2<f64>>,
}

impl Softmax {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, z: &ArrayView2<f64>) -> Array2<f64> {
        softmax(z)
    }
}

impl Layer for Softmax {
    fn forward(&mut self, z: &ArrayView2<f64>) -> Array2<f64> {
        self.input = Some(z.to_owned());
        self.apply(z)
    }

    fn backward(&mut self, grad: &ArrayView2<f64>, _learning_rate: f64) -> Result<Array2<f64>> {
        self.input.take().ok_or_else(|| missing_cache("softmax"))?;
        Ok(grad.to_owned())
    }
}

#[derive(Debug, Clone)]
pub enum LayerKind {
    Dense(Dense),
    Softplus(Softplus),
    Softmax(Softmax),
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Dense(_) => "Dense",
            LayerKind::Softplus(_) => "Softplus",
            LayerKind::Softmax(_) => "Softmax",
        }
    }

    /// Forward pass that leaves the cache untouched.
    pub fn apply(&self, input: &ArrayView2<f64>) -> Array2<f64> {
        match self {
            LayerKind::Dense(l) => l.apply(input),
            LayerKind::Softplus(l) => l.apply(input),
            LayerKind::Softmax(l) => l.apply(input),
        }
    }

    pub fn as_dense(&self) -> Option<&Dense> {
        match self {
            LayerKind::Dense(l) => Some(l),
            _ => None,
        }
    }
}

impl Layer for LayerKind {
    fn forward(&mut self, input: &ArrayView2<f64>) -> Array2<f64> {
        match self {
            LayerKind::Dense(l) => l.forward(input),
            LayerKind::Softplus(l) => l.forward(input),
            LayerKind::Softmax(l) => l.forward(input),
        }
    }

    fn backward(&mut self, grad: &ArrayView2<f64>, learning_rate: f64) -> Result<Array2<f64>> {
        match self {
            LayerKind::Dense(l) => l.backward(grad, learning_rate),
            LayerKind::Softplus(l) => l.backward(grad, learning_rate),
            LayerKind::Softmax(l) => l.backward(grad, learning_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn dense_forward_is_plain_matmul() {
        let mut dense = Dense::from_weights(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let out = dense.forward(&array![[1.0, 0.0, -1.0]].view());
        assert_eq!(out, array![[-4.0, -4.0]]);
    }

    #[test]
    fn dense_backward_matches_hand_computed_gradients() {
        let mut dense = Dense::from_weights(array![[0.5], [-1.0]]);
        let out = dense.forward(&array![[1.0, 2.0]].view());
        assert_relative_eq!(out[[0, 0]], -1.5);

        let dz = dense.backward(&array![[1.0]].view(), 0.1).unwrap();
        assert_relative_eq!(dz[[0, 0]], 0.5);
        assert_relative_eq!(dz[[0, 1]], -1.0);
        assert_relative_eq!(dense.weights()[[0, 0]], 0.4, epsilon = 1e-12);
        assert_relative_eq!(dense.weights()[[1, 0]], -1.2, epsilon = 1e-12);
    }

    #[test]
    fn dense_zero_gradient_leaves_weights_unchanged() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut dense = Dense::new(5, 3, &mut rng);
        let before = dense.weights().clone();
        let input = Array2::from_elem((4, 5), 0.3);
        dense.forward(&input.view());
        dense.backward(&Array2::zeros((4, 3)).view(), 0.5).unwrap();
        assert_eq!(dense.weights(), &before);
    }

    #[test]
    fn he_initialization_is_seeded_and_scaled() {
        let a = Dense::new(200, 50, &mut StdRng::seed_from_u64(1));
        let b = Dense::new(200, 50, &mut StdRng::seed_from_u64(1));
        assert_eq!(a.weights(), b.weights());

        let n = a.weights().len() as f64;
        let var = a.weights().mapv(|w| w * w).sum() / n;
        // expected variance is 2 / 200
        assert!((var - 0.01).abs() < 0.002, "variance {}", var);
    }

    #[test]
    fn mismatched_gradient_is_a_shape_error() {
        let mut dense = Dense::from_weights(array![[0.5], [-1.0]]);
        dense.forward(&array![[1.0, 2.0], [3.0, 4.0]].view());
        let err = dense.backward(&array![[1.0]].view(), 0.1).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));

        let mut softplus = Softplus::new();
        softplus.forward(&array![[0.0, 1.0]].view());
        assert!(matches!(
            softplus.backward(&array![[1.0, 1.0, 1.0]].view(), 0.1),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn backward_without_forward_is_an_error() {
        let mut softplus = Softplus::new();
        assert!(softplus.backward(&array![[1.0]].view(), 0.1).is_err());
    }

    #[test]
    fn softplus_values_and_derivative() {
        let mut softplus = Softplus::new();
        let out = softplus.forward(&array![[0.0, 1000.0, -1000.0]].view());
        assert_relative_eq!(out[[0, 0]], 2f64.ln());
        assert_relative_eq!(out[[0, 1]], 1000.0);
        assert!(out[[0, 2]] >= 0.0 && out[[0, 2]] < 1e-300);

        let grad = softplus.backward(&array![[2.0, 2.0, 2.0]].view(), 0.1).unwrap();
        assert_relative_eq!(grad[[0, 0]], 1.0);
        assert_relative_eq!(grad[[0, 1]], 2.0);
        assert_relative_eq!(grad[[0, 2]], 0.0);
    }

    #[test]
    fn softmax_rows_are_distributions() {
        let mut softmax = Softmax::new();
        let out = softmax.forward(&array![[1.0, 2.0, 3.0], [1000.0, 1000.0, -1000.0], [0.0, 0.0, 0.0]].view());
        for row in out.rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
        assert_relative_eq!(out[[1, 0]], 0.5);
        assert_relative_eq!(out[[2, 1]], 1.0 / 3.0);
    }

    #[test]
    fn softmax_backward_passes_gradient_through() {
        let mut softmax = Softmax::new();
        softmax.forward(&array![[0.2, 0.8]].view());
        let grad = array![[0.25, -0.25]];
        assert_eq!(softmax.backward(&grad.view(), 1.0).unwrap(), grad);
    }
}
