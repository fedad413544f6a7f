//! Loading and encoding of the tabular digit dataset.
//!
//! Files are headerless CSV: the first column is the class label, the rest are
//! pixel intensities in `0..=255`.

use std::path::Path;
use std::time::Instant;

use csv::ReaderBuilder;
use ndarray::prelude::*;

use crate::error::{Error, Result};
use crate::network::CLASS_COUNT;

const MAX_PIXEL: f64 = 255.0;

const DOWNLOAD_HINT: &str = "download at https://pjreddie.com/media/files/mnist_train.csv \
                             and https://pjreddie.com/media/files/mnist_test.csv";

/// Feature matrix and one-hot label matrix with matching row counts.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

impl Dataset {
    pub fn new(x: Array2<f64>, y: Array2<f64>) -> Result<Self> {
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
        for (r, row) in y.rows().into_iter().enumerate() {
            let ones = row.iter().filter(|&&v| v == 1.0).count();
            let zeros = row.iter().filter(|&&v| v == 0.0).count();
            if ones != 1 || ones + zeros != row.len() {
                return Err(Error::InvalidData(format!("label row {} is not one-hot", r)));
            }
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn labels(&self) -> Vec<usize> {
        crate::metrics::argmax_rows(&self.y.view())
    }
}

pub fn one_hot(labels: &[usize], classes: usize) -> Result<Array2<f64>> {
    let mut encoded = Array2::zeros((labels.len(), classes));
    for (i, &label) in labels.iter().enumerate() {
        if label >= classes {
            return Err(Error::InvalidData(format!(
                "label {} at row {} is outside 0..{}",
                label, i, classes
            )));
        }
        encoded[[i, label]] = 1.0;
    }
    Ok(encoded)
}

/// Scales every entry by the global maximum.
pub fn normalize(x: &ArrayView2<f64>) -> Array2<f64> {
    let max = x.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if max > 0.0 {
        x / max
    } else {
        x.to_owned()
    }
}

fn parse_field(field: &str, row: usize, col: usize) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::InvalidData(format!("row {} column {}: cannot parse {:?}", row, col, field)))
}

pub fn load_csv<P: AsRef<Path>>(path: P, classes: usize) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::DataUnavailable(format!(
            "{} not found; {}",
            path.display(),
            DOWNLOAD_HINT
        )));
    }

    let start = Instant::now();
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut labels = Vec::new();
    let mut pixels = Vec::new();
    let mut features = None;
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() < 2 {
            return Err(Error::InvalidData(format!("row {} has no pixel columns", row)));
        }
        let width = *features.get_or_insert(record.len() - 1);
        if record.len() - 1 != width {
            return Err(Error::InvalidData(format!(
                "row {} has {} pixel columns, expected {}",
                row,
                record.len() - 1,
                width
            )));
        }

        let label = parse_field(&record[0], row, 0)?;
        if label < 0.0 || label.fract() != 0.0 {
            return Err(Error::InvalidData(format!("row {} has label {}", row, label)));
        }
        labels.push(label as usize);
        for (col, field) in record.iter().enumerate().skip(1) {
            let pixel = parse_field(field, row, col)?;
            if !(0.0..=MAX_PIXEL).contains(&pixel) {
                return Err(Error::InvalidData(format!(
                    "row {} column {}: pixel {} is outside 0..={}",
                    row, col, pixel, MAX_PIXEL
                )));
            }
            pixels.push(pixel);
        }
    }

    let width = features.ok_or_else(|| Error::InvalidData(format!("{} is empty", path.display())))?;
    let raw = Array2::from_shape_vec((labels.len(), width), pixels)
        .map_err(|e| Error::InvalidData(e.to_string()))?;
    let dataset = Dataset::new(normalize(&raw.view()), one_hot(&labels, classes)?)?;
    log::info!(
        "Loaded {} ({} rows, {:.2}s)",
        path.display(),
        dataset.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(dataset)
}

/// Loads `(train, test)` with the default class count.
pub fn load_mnist<P: AsRef<Path>, Q: AsRef<Path>>(train: P, test: Q) -> Result<(Dataset, Dataset)> {
    Ok((load_csv(train, CLASS_COUNT)?, load_csv(test, CLASS_COUNT)?))
}
