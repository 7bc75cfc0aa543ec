//! IVA errors.

use tesoro_shared::AppError;
use tesoro_shared::types::Currency;
use thiserror::Error;

/// Errors raised while computing or storing IVA positions.
#[derive(Debug, Error)]
pub enum IvaError {
    /// Amounts must not be negative.
    #[error("IVA amounts must not be negative")]
    NegativeAmount,

    /// Sale and cost currencies differ and the operation carries no rate.
    #[error("Missing exchange rate to convert operator cost from {from} to {to}")]
    MissingExchangeRate {
        /// Operator cost currency.
        from: Currency,
        /// Sale currency.
        to: Currency,
    },

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<IvaError> for AppError {
    fn from(err: IvaError) -> Self {
        match err {
            IvaError::NegativeAmount => Self::Validation(err.to_string()),
            IvaError::MissingExchangeRate { .. } => Self::ExchangeRateUnavailable(err.to_string()),
            IvaError::Store(inner) => inner,
        }
    }
}
