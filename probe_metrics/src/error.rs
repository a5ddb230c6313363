use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metric '{name}' is already registered")]
    Duplicate { name: String },

    #[error("Metric '{name}' expects {expected} label values, got {got}")]
    LabelMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Invalid metric definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
