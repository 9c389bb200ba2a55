use api_client::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API client error: {0}")]
    ApiClient(#[from] ApiError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Risk management error: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("Symbol error: {0}")]
    Symbol(#[from] core_types::CoreError),

    #[error("Gave up after {attempts} consecutive session failures; last error: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },
}

impl EngineError {
    /// Whether the error means the session itself is gone and must be reopened.
    ///
    /// Everything else is a per-bar failure: logged, paused on, and skipped.
    pub fn is_session_fault(&self) -> bool {
        matches!(
            self,
            EngineError::ApiClient(ApiError::Request(_) | ApiError::Closed)
        )
    }
}
