use thiserror::Error;

/// Everything that can stop a training or evaluation run.
///
/// All variants are fatal to the run that raised them; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("numeric instability during {stage}: {detail}")]
    NumericInstability { stage: &'static str, detail: String },

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
