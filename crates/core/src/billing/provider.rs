//! Port to the payment provider's REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tesoro_shared::AppResult;

/// A payment as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPayment {
    /// Payment id.
    pub id: String,
    /// Raw status.
    pub status: String,
    /// Preapproval the payment belongs to.
    pub preapproval_id: Option<String>,
    /// Our reference (agency id).
    pub external_reference: Option<String>,
    /// Amount.
    pub transaction_amount: Option<Decimal>,
    /// Currency code.
    pub currency_id: Option<String>,
    /// Approval time.
    pub date_approved: Option<DateTime<Utc>>,
}

/// A preapproval (recurring subscription) as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPreapproval {
    /// Preapproval id.
    pub id: String,
    /// Raw status.
    pub status: String,
    /// Our reference (agency id).
    pub external_reference: Option<String>,
    /// Next charge.
    pub next_payment_date: Option<DateTime<Utc>>,
}

/// Reads current remote state.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Fetches a payment; `None` if the provider does not know it.
    async fn get_payment(&self, id: &str) -> AppResult<Option<ProviderPayment>>;

    /// Fetches a preapproval; `None` if the provider does not know it.
    async fn get_preapproval(&self, id: &str) -> AppResult<Option<ProviderPreapproval>>;
}
