//! Exchange-rate errors.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tesoro_shared::AppError;
use thiserror::Error;

/// Errors that can occur while resolving or storing exchange rates.
#[derive(Debug, Error)]
pub enum CurrencyError {
    /// No stored rate and no fallback configured.
    #[error("No USD/ARS exchange rate available for {0}")]
    NotFound(NaiveDate),

    /// Only the last-resort constant was available and the caller refused it.
    #[error("Only the fallback USD/ARS rate {rate} is available for {date}")]
    DegradedOnly {
        /// Date that was requested.
        date: NaiveDate,
        /// The fallback constant.
        rate: Decimal,
    },

    /// Rate must be positive.
    #[error("Exchange rate must be positive")]
    NonPositiveRate,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<CurrencyError> for AppError {
    fn from(err: CurrencyError) -> Self {
        match err {
            CurrencyError::NotFound(_) | CurrencyError::DegradedOnly { .. } => {
                Self::ExchangeRateUnavailable(err.to_string())
            }
            CurrencyError::NonPositiveRate => Self::Validation(err.to_string()),
            CurrencyError::Store(inner) => inner,
        }
    }
}
