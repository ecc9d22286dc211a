use oxidize_select_core::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Column '{0}' not found in header")]
    MissingColumn(String),

    #[error("Line {line}, column '{column}': cannot parse '{value}' as a number")]
    Parse {
        line: u64,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type IoResult<T> = Result<T, IoError>;
