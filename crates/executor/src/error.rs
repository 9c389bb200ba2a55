use api_client::ApiError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("I/O error while loading replay data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid replay data in {path}: {message}")]
    InvalidData { path: PathBuf, message: String },

    #[error("No bar files found in {0}")]
    NoData(PathBuf),

    #[error("Symbol not known to the replay: {0}")]
    UnknownSymbol(String),

    #[error("Symbol '{0}' has no bar at or before the current clock")]
    NoPrice(String),

    #[error("Symbol '{0}' was never subscribed")]
    NotSubscribed(String),

    #[error("The replay session is closed")]
    Closed,
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::UnknownSymbol(symbol) | ExecutorError::NotSubscribed(symbol) => {
                ApiError::UnknownSymbol(symbol)
            }
            ExecutorError::Closed => ApiError::Closed,
            other => ApiError::Rejected(other.to_string()),
        }
    }
}
