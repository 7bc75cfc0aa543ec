//! Persistence port for billing.

use async_trait::async_trait;
use tesoro_shared::AppResult;
use tesoro_shared::types::AgencyId;

use super::events::BillingEvent;
use super::subscription::Subscription;

/// Storage of billing events and subscriptions.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Whether an event with this dedup key exists.
    async fn event_exists(&self, event_type: &str, external_id: &str) -> AppResult<bool>;

    /// Inserts the event and, in the same transaction, saves `subscription`.
    /// Returns false without changing anything if the dedup key exists.
    async fn record_event(
        &self,
        event: &BillingEvent,
        subscription: Option<&Subscription>,
    ) -> AppResult<bool>;

    /// Finds the subscription of a preapproval.
    async fn find_subscription_by_preapproval(
        &self,
        preapproval_id: &str,
    ) -> AppResult<Option<Subscription>>;

    /// Finds the subscription of an agency.
    async fn find_subscription_by_agency(
        &self,
        agency_id: AgencyId,
    ) -> AppResult<Option<Subscription>>;
}
