use ndarray::prelude::*;
use rand::Rng;

use crate::error::{Error, Result};
use crate::metrics::{accuracy, argmax_rows};
use crate::network::Network;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Percentage of rows classified correctly.
    pub accuracy: f64,
    /// Softmax output, one row per input row.
    pub predictions: Array2<f64>,
}

impl Evaluation {
    pub fn predicted_classes(&self) -> Vec<usize> {
        argmax_rows(&self.predictions.view())
    }
}

/// Classifies all of `x` in one forward pass. The network is not modified.
pub fn evaluate(x: &ArrayView2<f64>, y: &ArrayView2<f64>, network: &Network) -> Result<Evaluation> {
    if x.nrows() != y.nrows() {
        return Err(Error::config(format!(
            "X has {} rows but Y has {}",
            x.nrows(),
            y.nrows()
        )));
    }
    if y.ncols() != network.output_size() {
        return Err(Error::config(format!(
            "labels have {} classes, network predicts {}",
            y.ncols(),
            network.output_size()
        )));
    }

    let predictions = network.predict(x)?;
    let acc = 100.0 * accuracy(&predictions.view(), y);
    log::info!("Test accuracy: {:.5}%", acc);
    Ok(Evaluation {
        accuracy: acc,
        predictions,
    })
}

/// Picks `count` random rows (with replacement) and their predicted class,
/// for visual spot checks of the test images.
pub fn sample_predictions<R: Rng + ?Sized>(
    predictions: &ArrayView2<f64>,
    count: usize,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    if predictions.nrows() == 0 {
        return Vec::new();
    }
    let classes = argmax_rows(predictions);
    (0..count)
        .map(|_| {
            let row = rng.gen_range(0..predictions.nrows());
            (row, classes[row])
        })
        .collect()
}
