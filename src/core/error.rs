use crate::core::currency::Currency;
use thiserror::Error;

/// Recoverable failures. None of these terminate the process; the timer tick or
/// message handler that hit one logs it and moves on.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Not enough price history for {symbol}: got {observations} observation(s)")]
    NoData { symbol: String, observations: usize },

    #[error("Exchange rate unavailable for {from}->{to}")]
    RateUnavailable { from: Currency, to: Currency },

    #[error("Could not parse {field}: {reason}")]
    ParseFailure { field: String, reason: String },

    #[error("Presence update rejected: {0}")]
    PublishFailure(String),

    #[error("You need one of these roles to do that: {}", .required.join(", "))]
    PermissionDenied { required: Vec<String> },

    #[error("{0}")]
    NotFound(String),
}
