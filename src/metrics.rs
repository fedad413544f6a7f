use ndarray::prelude::*;

fn max_index(a: &ArrayView1<f64>) -> usize {
    let mut max = f64::NEG_INFINITY;
    let mut max_index = 0;
    for (i, &v) in a.iter().enumerate() {
        if v > max {
            max = v;
            max_index = i;
        }
    }
    max_index
}

/// Index of the largest entry of every row; ties go to the first.
pub fn argmax_rows(a: &ArrayView2<f64>) -> Vec<usize> {
    a.rows().into_iter().map(|row| max_index(&row)).collect()
}

/// Fraction of rows whose argmax agrees between `output` and `target`.
pub fn accuracy(output: &ArrayView2<f64>, target: &ArrayView2<f64>) -> f64 {
    if output.nrows() == 0 {
        return 0.0;
    }
    let hits = argmax_rows(output)
        .into_iter()
        .zip(argmax_rows(target))
        .filter(|(p, t)| p == t)
        .count();
    hits as f64 / output.nrows() as f64
}

/// Mean of the squared entries of `error`.
pub fn mean_squared_error(error: &ArrayView2<f64>) -> f64 {
    error.mapv(|e| e * e).mean().unwrap_or(0.0)
}

/// Per-cycle training metrics. Entries are only ever appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    cost: Vec<f64>,
    accuracy: Vec<f64>,
    duration: Vec<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, cost: f64, accuracy: f64, duration: f64) {
        self.cost.push(cost);
        self.accuracy.push(accuracy);
        self.duration.push(duration);
    }

    pub fn cost(&self) -> &[f64] {
        &self.cost
    }

    /// Accuracy in percent.
    pub fn accuracy(&self) -> &[f64] {
        &self.accuracy
    }

    /// Wall-clock seconds per cycle.
    pub fn duration(&self) -> &[f64] {
        &self.duration
    }

    pub fn len(&self) -> usize {
        self.cost.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cost.is_empty()
    }

    pub fn last_accuracy(&self) -> Option<f64> {
        self.accuracy.last().copied()
    }

    pub fn avg_duration(&self) -> f64 {
        if self.duration.is_empty() {
            0.0
        } else {
            self.duration.iter().sum::<f64>() / self.duration.len() as f64
        }
    }

    /// Last minus first recorded accuracy.
    pub fn accuracy_delta(&self) -> f64 {
        match (self.accuracy.first(), self.accuracy.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}
