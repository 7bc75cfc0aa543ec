//! Ledger error types.

use tesoro_shared::AppError;
use tesoro_shared::types::{CashBoxId, Currency, FinancialAccountId, MovementId};
use thiserror::Error;

use crate::currency::CurrencyError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount must be strictly positive.
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Account not found in the agency.
    #[error("Financial account not found: {0}")]
    AccountNotFound(FinancialAccountId),

    /// Account is inactive and cannot be used.
    #[error("Financial account {0} is inactive")]
    AccountInactive(FinancialAccountId),

    /// Cash box not found in the agency.
    #[error("Cash box not found: {0}")]
    CashBoxNotFound(CashBoxId),

    /// Cash box is inactive and cannot be used.
    #[error("Cash box {0} is inactive")]
    CashBoxInactive(CashBoxId),

    /// Movement currency does not match the target's currency.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        /// Currency of the account or box.
        expected: Currency,
        /// Currency of the movement.
        actual: Currency,
    },

    /// Movement not found in the agency.
    #[error("Ledger movement not found: {0}")]
    MovementNotFound(MovementId),

    /// Exchange rate could not be resolved.
    #[error(transparent)]
    ExchangeRate(#[from] CurrencyError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount | LedgerError::CurrencyMismatch { .. } => {
                Self::Validation(err.to_string())
            }
            LedgerError::AccountNotFound(_)
            | LedgerError::CashBoxNotFound(_)
            | LedgerError::MovementNotFound(_) => Self::NotFound(err.to_string()),
            LedgerError::AccountInactive(_) | LedgerError::CashBoxInactive(_) => {
                Self::BusinessRule(err.to_string())
            }
            LedgerError::ExchangeRate(inner) => inner.into(),
            LedgerError::Store(inner) => inner,
        }
    }
}
