use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::{Error, Network, TrainConfig, Trainer};

impl From<Error> for PyErr {
    fn from(err: Error) -> PyErr {
        match err {
            Error::NumericInstability { .. } => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

#[pyclass]
struct Classifier {
    config: TrainConfig,
    network: Option<Network>,
}

#[pymethods]
impl Classifier {
    #[new]
    #[pyo3(signature = (layers = vec![128, 64], cycles = 13, lr = 0.007, batch_size = 64, seed = Some(4)))]
    fn py_new(
        layers: Vec<usize>,
        cycles: usize,
        lr: f64,
        batch_size: usize,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let config = TrainConfig {
            hidden_layers: layers,
            cycles,
            learning_rate: lr,
            batch_size,
            seed,
        };
        config.validate()?;
        Ok(Self {
            config,
            network: None,
        })
    }

    /// Trains a fresh network and returns the per-cycle metrics for plotting.
    fn train<'py>(
        &mut self,
        py: Python<'py>,
        x: PyReadonlyArray2<f64>,
        y: PyReadonlyArray2<f64>,
    ) -> PyResult<&'py PyDict> {
        let report = Trainer::new(self.config.clone()).train(&x.as_array(), &y.as_array())?;
        let stats = PyDict::new(py);
        stats.set_item("cost", report.history.cost().to_vec())?;
        stats.set_item("accuracy", report.history.accuracy().to_vec())?;
        stats.set_item("duration", report.history.duration().to_vec())?;
        stats.set_item("total_time", report.total_time)?;
        stats.set_item("avg_cycle_time", report.avg_cycle_time)?;
        stats.set_item("accuracy_delta", report.accuracy_delta)?;
        stats.set_item("state", format!("{:?}", report.state))?;
        self.network = Some(report.network);
        Ok(stats)
    }

    /// Returns `(accuracy_percent, predictions)` for a held-out set.
    fn evaluate<'py>(
        &self,
        py: Python<'py>,
        x: PyReadonlyArray2<f64>,
        y: PyReadonlyArray2<f64>,
    ) -> PyResult<(f64, &'py PyArray2<f64>)> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("classifier has not been trained"))?;
        let eval = crate::evaluate(&x.as_array(), &y.as_array(), network)?;
        Ok((eval.accuracy, eval.predictions.into_pyarray(py)))
    }

    fn dimensions(&self) -> Vec<(usize, usize)> {
        self.network.as_ref().map(Network::dimensions).unwrap_or_default()
    }
}

#[pymodule]
fn ff_classifier(_: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Classifier>()?;
    Ok(())
}
