//! Feed-forward digit classifier trained with hand-written backpropagation.
//!
//! The network is `Dense -> Softplus` per hidden layer followed by
//! `Dense -> Softmax`, trained with plain mini-batch SGD on a squared-error
//! signal. Matrices are `ndarray::Array2<f64>`; enable the `blas` feature to
//! route matrix products through OpenBLAS.
//!
//! ```no_run
//! use ff_classifier::{data, evaluate, train, TrainConfig};
//!
//! # fn main() -> ff_classifier::Result<()> {
//! let (train_set, test_set) = data::load_mnist("data/mnist_train.csv", "data/mnist_test.csv")?;
//! let report = train(&train_set.x.view(), &train_set.y.view(), &TrainConfig::default())?;
//! let eval = evaluate(&test_set.x.view(), &test_set.y.view(), &report.network)?;
//! println!("test accuracy {:.2}%", eval.accuracy);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "blas")]
extern crate blas_src;

pub mod batch;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod layer;
pub mod metrics;
pub mod network;
pub mod train;

#[cfg(feature = "python")]
mod python;

pub use batch::Batch;
pub use config::TrainConfig;
pub use data::Dataset;
pub use error::{Error, Result};
pub use evaluate::{evaluate, Evaluation};
pub use layer::{Dense, Layer, LayerKind, Softmax, Softplus};
pub use metrics::History;
pub use network::{Network, CLASS_COUNT};
pub use train::{train, CancelToken, TrainReport, TrainState, Trainer};
