use core_types::CoreError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Risk parameters from configuration are invalid: {0}")]
    InvalidParameters(String),

    #[error("Insufficient account balance ({0}) to size a trade.")]
    InsufficientEquity(Decimal),

    #[error("The provided entry price ({0}) is zero or negative.")]
    InvalidEntryPrice(Decimal),

    #[error("No instrument configuration found for '{0}'")]
    UnknownInstrument(String),

    #[error("Cannot size contract symbol: {0}")]
    Symbol(#[from] CoreError),

    #[error("A calculation error occurred: {0}")]
    Calculation(String),
}
