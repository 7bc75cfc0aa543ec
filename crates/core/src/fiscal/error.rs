//! Fiscal errors.

use tesoro_shared::AppError;
use tesoro_shared::types::{AgencyId, InvoiceId};
use thiserror::Error;

use super::types::InvoiceStatus;

/// Errors raised while authorizing invoices.
#[derive(Debug, Error)]
pub enum FiscalError {
    /// Invoice not found in the agency.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// The invoice cannot be authorized from its current status.
    #[error("Invoice cannot be authorized from status {0}")]
    InvalidStatus(InvoiceStatus),

    /// The agency has no fiscal settings.
    #[error("Agency {0} has no fiscal settings")]
    NotConfigured(AgencyId),

    /// The monetary breakdown is inconsistent.
    #[error("Invalid invoice breakdown: {0}")]
    InvalidBreakdown(String),

    /// The authority did not answer in time.
    #[error("Fiscal authority timed out during {0}")]
    Timeout(&'static str),

    /// The authority bridge failed.
    #[error("Fiscal authority error: {0}")]
    Bridge(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<FiscalError> for AppError {
    fn from(err: FiscalError) -> Self {
        match err {
            FiscalError::InvoiceNotFound(_) => Self::NotFound(err.to_string()),
            FiscalError::InvalidStatus(_) => Self::BusinessRule(err.to_string()),
            FiscalError::NotConfigured(_) => Self::BusinessRule(err.to_string()),
            FiscalError::InvalidBreakdown(_) => Self::Validation(err.to_string()),
            FiscalError::Timeout(_) | FiscalError::Bridge(_) => {
                Self::ExternalService(err.to_string())
            }
            FiscalError::Store(inner) => inner,
        }
    }
}
