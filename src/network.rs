use ndarray::prelude::*;
use rand::Rng;

use crate::error::{Error, Result};
use crate::layer::{Dense, Layer, LayerKind, Softmax, Softplus};

/// Number of output classes of the digit classifier.
pub const CLASS_COUNT: usize = 10;

/// Ordered stack of layers: `(Dense, Softplus)` per hidden width, then `(Dense, Softmax)`.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<LayerKind>,
}

fn check_finite(values: &Array2<f64>, stage: &'static str) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(i) => Err(Error::NumericInstability {
            stage,
            detail: format!(
                "non-finite value {} at row {}, column {}",
                values.iter().nth(i).copied().unwrap_or(f64::NAN),
                i / values.ncols().max(1),
                i % values.ncols().max(1)
            ),
        }),
    }
}

impl Network {
    /// Builds a network for `input_size` features and the default ten classes.
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden: &[usize], rng: &mut R) -> Result<Self> {
        Self::with_classes(input_size, hidden, CLASS_COUNT, rng)
    }

    pub fn with_classes<R: Rng + ?Sized>(
        input_size: usize,
        hidden: &[usize],
        classes: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if input_size == 0 {
            return Err(Error::config("input size must be > 0"));
        }
        if hidden.is_empty() {
            return Err(Error::config("at least one hidden layer width is required"));
        }
        if let Some(l) = hidden.iter().position(|&w| w == 0) {
            return Err(Error::config(format!("hidden layer {} has width 0", l + 1)));
        }
        if classes < 2 {
            return Err(Error::config(format!("need at least 2 classes, got {}", classes)));
        }

        let mut layers = Vec::with_capacity(2 * hidden.len() + 2);
        let mut fan_in = input_size;
        for &width in hidden {
            layers.push(LayerKind::Dense(Dense::new(fan_in, width, rng)));
            layers.push(LayerKind::Softplus(Softplus::new()));
            fan_in = width;
        }
        layers.push(LayerKind::Dense(Dense::new(fan_in, classes, rng)));
        layers.push(LayerKind::Softmax(Softmax::new()));

        let network = Self { layers };
        for (l, (rows, cols)) in network.dimensions().into_iter().enumerate() {
            log::debug!("Layer {} dimensions: ({} x {})", l + 1, rows, cols);
        }
        Ok(network)
    }

    /// Builds a network around existing weight matrices, one per Dense layer.
    ///
    /// Every matrix but the last is followed by Softplus, the last by Softmax.
    pub fn from_weights(weights: Vec<Array2<f64>>) -> Result<Self> {
        if weights.len() < 2 {
            return Err(Error::config("need a hidden and an output weight matrix"));
        }
        for (l, pair) in weights.windows(2).enumerate() {
            if pair[0].ncols() != pair[1].nrows() {
                return Err(Error::Shape(format!(
                    "weights {} are {:?} but weights {} are {:?}",
                    l + 1,
                    pair[0].dim(),
                    l + 2,
                    pair[1].dim()
                )));
            }
        }
        if weights.iter().any(|w| w.is_empty()) {
            return Err(Error::Shape("weight matrices must be non-empty".to_owned()));
        }

        let last = weights.len() - 1;
        let mut layers = Vec::with_capacity(2 * weights.len());
        for (l, w) in weights.into_iter().enumerate() {
            layers.push(LayerKind::Dense(Dense::from_weights(w)));
            if l == last {
                layers.push(LayerKind::Softmax(Softmax::new()));
            } else {
                layers.push(LayerKind::Softplus(Softplus::new()));
            }
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[LayerKind] {
        &self.layers
    }

    /// `(input, output)` shape of every Dense layer, in order.
    pub fn dimensions(&self) -> Vec<(usize, usize)> {
        self.dense_layers()
            .map(|d| (d.input_size(), d.output_size()))
            .collect()
    }

    pub fn weights(&self) -> Vec<&Array2<f64>> {
        self.dense_layers().map(Dense::weights).collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.dense_layers().map(|d| d.weights().len()).sum()
    }

    pub fn input_size(&self) -> usize {
        self.dense_layers().next().map_or(0, Dense::input_size)
    }

    pub fn output_size(&self) -> usize {
        self.dense_layers().last().map_or(0, Dense::output_size)
    }

    fn dense_layers(&self) -> impl Iterator<Item = &Dense> {
        self.layers.iter().filter_map(LayerKind::as_dense)
    }

    fn check_input(&self, batch: &ArrayView2<f64>) -> Result<()> {
        if batch.ncols() != self.input_size() {
            return Err(Error::Shape(format!(
                "batch has {} features, network expects {}",
                batch.ncols(),
                self.input_size()
            )));
        }
        Ok(())
    }

    /// Feeds `batch` through every layer, caching inputs for `backward`.
    pub fn forward(&mut self, batch: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_input(batch)?;
        let mut output = batch.to_owned();
        for layer in self.layers.iter_mut() {
            output = layer.forward(&output.view());
        }
        check_finite(&output, "forward pass")?;
        Ok(output)
    }

    /// Same result as `forward` without touching any layer cache.
    pub fn predict(&self, batch: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_input(batch)?;
        let mut output = batch.to_owned();
        for layer in &self.layers {
            output = layer.apply(&output.view());
        }
        check_finite(&output, "prediction")?;
        Ok(output)
    }

    /// Backpropagates `error = output - target` for the batch last passed to `forward`.
    ///
    /// The error is scaled by `1 / batch rows` and handed to the Softmax layer
    /// unchanged, which only holds for that exact squared-error signal.
    pub fn backward(
        &mut self,
        batch: &ArrayView2<f64>,
        error: &ArrayView2<f64>,
        learning_rate: f64,
    ) -> Result<()> {
        if batch.nrows() == 0 {
            return Err(Error::Shape("cannot backpropagate an empty batch".to_owned()));
        }
        if error.dim() != (batch.nrows(), self.output_size()) {
            return Err(Error::Shape(format!(
                "error is {:?}, expected ({}, {})",
                error.dim(),
                batch.nrows(),
                self.output_size()
            )));
        }
        let mut grad = error.mapv(|e| e / batch.nrows() as f64);
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad.view(), learning_rate)?;
        }
        check_finite(&grad, "backward pass")
    }
}
