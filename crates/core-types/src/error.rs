use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Symbol '{0}' is not of the form EXCHANGE.product")]
    MalformedSymbol(String),
}
