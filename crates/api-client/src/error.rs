use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request to the gateway failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Symbol '{0}' is not known to the feed")]
    UnknownSymbol(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("The API session is closed")]
    Closed,
}
