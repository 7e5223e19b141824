use rust_decimal::Decimal;
use thiserror::Error;

/// Failure taxonomy for trade placement, cancellation, and settlement.
///
/// The HTTP layer maps these to status codes; the engine and stores
/// produce them.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("{0}")]
    Validation(String),

    #[error("unsupported trade duration: {0}s")]
    InvalidDuration(u32),

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("no price available for {0}")]
    PriceUnavailable(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TradeError {
    /// Wraps an unexpected store failure.
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Internal(err.into())
    }
}
