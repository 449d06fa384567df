use thiserror::Error;

/// Errors surfaced by the grid controller.
///
/// Only host wiring mistakes and storage problems are errors. Vetoed
/// selections and refused edit transitions are reported as outcomes.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GridError {
    pub fn data_key_required(operation: &str) -> Self {
        Self::Configuration(format!("a Data Key is required for {operation}"))
    }

    pub fn global_filter_fields_required() -> Self {
        Self::Configuration("global filtering requires an explicit field list".to_string())
    }

    pub fn unknown_storage(kind: &str) -> Self {
        Self::StorageUnavailable(format!(
            "{kind} is not a valid state storage, supported values are \"local\" and \"session\""
        ))
    }
}

pub type Result<T> = std::result::Result<T, GridError>;
