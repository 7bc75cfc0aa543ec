//! Billing events: the webhook idempotency ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tesoro_shared::types::{AgencyId, BillingEventId, SubscriptionId};

/// An applied provider notification. Inserted once per dedup key, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    /// Event id.
    pub id: BillingEventId,
    /// Agency, when resolved.
    pub agency_id: Option<AgencyId>,
    /// Subscription, when resolved.
    pub subscription_id: Option<SubscriptionId>,
    /// e.g. `payment.approved`, `preapproval.paused`.
    pub event_type: String,
    /// Provider payment id.
    pub mp_payment_id: Option<String>,
    /// Provider notification id.
    pub mp_notification_id: Option<String>,
    /// Provider preapproval id.
    pub mp_preapproval_id: Option<String>,
    /// Charged amount.
    pub amount: Option<Decimal>,
    /// Re-fetched provider state.
    pub payload: serde_json::Value,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl BillingEvent {
    /// `(event_type, external id)`: the payment id, else the notification
    /// id, else the preapproval id.
    #[must_use]
    pub fn dedup_key(&self) -> (&str, Option<&str>) {
        (
            &self.event_type,
            self.mp_payment_id
                .as_deref()
                .or(self.mp_notification_id.as_deref())
                .or(self.mp_preapproval_id.as_deref()),
        )
    }
}
