//! Per-cycle shuffling and partitioning of the training set.

use std::time::Instant;

use ndarray::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};

/// Rows of X and their matching rows of Y.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }
}

/// Applies one random permutation to the rows of both `x` and `y`.
pub fn shuffle<R: Rng + ?Sized>(
    x: &ArrayView2<f64>,
    y: &ArrayView2<f64>,
    rng: &mut R,
) -> (Array2<f64>, Array2<f64>) {
    let mut idxs: Vec<usize> = (0..x.nrows()).collect();
    idxs.shuffle(rng);
    (x.select(Axis(0), &idxs), y.select(Axis(0), &idxs))
}

/// Splits rows into `n / batch_size - 1` batches of `batch_size` rows and one
/// final batch holding everything left, between `batch_size` and
/// `2 * batch_size - 1` rows. With fewer than `batch_size` rows the whole set
/// is a single batch.
pub fn partition(x: &ArrayView2<f64>, y: &ArrayView2<f64>, batch_size: usize) -> Vec<Batch> {
    let m = x.nrows();
    let num_batches = m / batch_size;
    let mut batches = Vec::with_capacity(num_batches.max(1));
    for b in 0..num_batches.saturating_sub(1) {
        let start = b * batch_size;
        let end = (b + 1) * batch_size;
        batches.push(Batch {
            x: x.slice(s![start..end, ..]).to_owned(),
            y: y.slice(s![start..end, ..]).to_owned(),
        });
    }
    let last_start = num_batches.saturating_sub(1) * batch_size;
    batches.push(Batch {
        x: x.slice(s![last_start.., ..]).to_owned(),
        y: y.slice(s![last_start.., ..]).to_owned(),
    });
    batches
}

/// Pre-shuffles and partitions the dataset once per cycle.
///
/// Every inner list covers all rows exactly once. Memory grows with
/// `cycles * rows`.
pub fn batch<R: Rng + ?Sized>(
    x: &ArrayView2<f64>,
    y: &ArrayView2<f64>,
    batch_size: usize,
    cycles: usize,
    rng: &mut R,
) -> Result<Vec<Vec<Batch>>> {
    if batch_size == 0 {
        return Err(Error::config("batch size must be > 0"));
    }
    if cycles == 0 {
        return Err(Error::config("cycle count must be > 0"));
    }
    if x.nrows() != y.nrows() {
        return Err(Error::config(format!(
            "X has {} rows but Y has {}",
            x.nrows(),
            y.nrows()
        )));
    }
    if x.nrows() == 0 {
        return Err(Error::config("dataset is empty"));
    }

    let start = Instant::now();
    let train_batches = (0..cycles)
        .map(|_| {
            let (shuffled_x, shuffled_y) = shuffle(x, y, rng);
            partition(&shuffled_x.view(), &shuffled_y.view(), batch_size)
        })
        .collect();
    log::debug!(
        "Batched training dataset for {} cycles in {:.2}s",
        cycles,
        start.elapsed().as_secs_f64()
    );
    Ok(train_batches)
}
