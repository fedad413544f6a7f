//! Training hyperparameters, loadable from JSON.
//!
//! ```json
//! {
//!   "hidden_layers": [128, 64],
//!   "cycles": 13,
//!   "learning_rate": 0.007,
//!   "batch_size": 64,
//!   "seed": 4
//! }
//! ```
//!
//! Missing fields take the defaults shown above.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Widths of the hidden layers; the output layer is implied by the label count.
    pub hidden_layers: Vec<usize>,
    /// Upper bound on full passes over the training set.
    pub cycles: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Seed for weight initialization and shuffling; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![128, 64],
            cycles: 13,
            learning_rate: 0.007,
            batch_size: 64,
            seed: Some(4),
        }
    }
}

impl TrainConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::DataUnavailable(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.is_empty() {
            return Err(Error::config("at least one hidden layer width is required"));
        }
        if let Some(l) = self.hidden_layers.iter().position(|&w| w == 0) {
            return Err(Error::config(format!("hidden layer {} has width 0", l + 1)));
        }
        if self.cycles == 0 {
            return Err(Error::config("cycle count must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch size must be > 0"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::config(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = TrainConfig::from_json_str(r#"{ "cycles": 3, "seed": null }"#).unwrap();
        assert_eq!(config.cycles, 3);
        assert_eq!(config.seed, None);
        assert_eq!(config.hidden_layers, vec![128, 64]);
        assert_eq!(config.batch_size, 64);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for json in [
            r#"{ "hidden_layers": [] }"#,
            r#"{ "hidden_layers": [16, 0] }"#,
            r#"{ "cycles": 0 }"#,
            r#"{ "batch_size": 0 }"#,
            r#"{ "learning_rate": -0.1 }"#,
        ] {
            assert!(
                matches!(TrainConfig::from_json_str(json), Err(Error::Configuration(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            TrainConfig::from_json_str("{ cycles: 3 }"),
            Err(Error::Json(_))
        ));
    }
}
