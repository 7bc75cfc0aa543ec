//! Payment-provider webhook ingestion.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tesoro_shared::types::{AgencyId, BillingEventId};
use tesoro_shared::{AppError, AppResult};
use tracing::{debug, info, instrument};

use super::events::BillingEvent;
use super::provider::PaymentProvider;
use super::signature::verify_signature;
use super::store::BillingStore;
use super::subscription::{Subscription, apply_payment_status, apply_preapproval_status};
use crate::webhook::{
    IngestOutcome, WebhookError, WebhookFailure, WebhookFailureLog, WebhookSource, admit,
    log_failure,
};

/// A raw webhook delivery.
#[derive(Debug, Clone, Default)]
pub struct PaymentWebhookRequest {
    /// Raw body.
    pub body: Vec<u8>,
    /// `x-signature` header.
    pub signature: Option<String>,
    /// `x-request-id` header.
    pub request_id: Option<String>,
    /// `data.id` query parameter.
    pub query_data_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteId {
    Text(String),
    Number(i64),
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct NotificationData {
    id: Option<RemoteId>,
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "type")]
    kind: Option<String>,
    id: Option<RemoteId>,
    #[serde(default)]
    data: NotificationData,
}

/// Ingests payment and preapproval notifications.
pub struct PaymentWebhookIngestor {
    store: Arc<dyn BillingStore>,
    provider: Arc<dyn PaymentProvider>,
    failures: Arc<dyn WebhookFailureLog>,
    secret: Option<String>,
    production: bool,
}

impl PaymentWebhookIngestor {
    /// Creates a new ingestor.
    #[must_use]
    pub fn new(
        store: Arc<dyn BillingStore>,
        provider: Arc<dyn PaymentProvider>,
        failures: Arc<dyn WebhookFailureLog>,
        secret: Option<String>,
        production: bool,
    ) -> Self {
        Self {
            store,
            provider,
            failures,
            secret,
            production,
        }
    }

    /// Verifies and applies one delivery.
    ///
    /// Only the signature check can fail the call. Anything that goes wrong
    /// afterwards is written to the failure log and reported as
    /// [`IngestOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` when the signature is rejected.
    #[instrument(skip_all, fields(request_id = request.request_id.as_deref()))]
    pub async fn ingest(
        &self,
        request: &PaymentWebhookRequest,
    ) -> Result<IngestOutcome, WebhookError> {
        let notification = serde_json::from_slice::<Notification>(&request.body);
        let data_id = notification
            .as_ref()
            .ok()
            .and_then(|n| n.data.id.as_ref())
            .map(RemoteId::to_string)
            .or_else(|| request.query_data_id.clone());

        let check = verify_signature(
            self.secret.as_deref(),
            request.signature.as_deref(),
            request.request_id.as_deref(),
            data_id.as_deref(),
        );
        admit(WebhookSource::Billing, &check, self.production)?;

        let notification = match notification {
            Ok(n) => n,
            Err(e) => {
                let failure = WebhookFailure::new(
                    WebhookSource::Billing,
                    &request.body,
                    format!("invalid payload: {e}"),
                );
                log_failure(self.failures.as_ref(), failure).await;
                return Ok(IngestOutcome::Failed("invalid payload".into()));
            }
        };

        let kind = notification.kind.unwrap_or_default();
        let Some(data_id) = data_id else {
            return Ok(IngestOutcome::Ignored("missing data.id".into()));
        };
        let notification_id = notification.id.as_ref().map(RemoteId::to_string);

        let result = match kind.as_str() {
            "payment" => self.handle_payment(&data_id, notification_id).await,
            "subscription_preapproval" | "preapproval" => {
                self.handle_preapproval(&data_id, notification_id).await
            }
            other => {
                debug!(event_type = other, "ignoring payment webhook");
                return Ok(IngestOutcome::Ignored(format!("unhandled type {other}")));
            }
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let failure = WebhookFailure::new(WebhookSource::Billing, &request.body, e.to_string())
                    .with_event_type(kind)
                    .with_external_id(data_id);
                log_failure(self.failures.as_ref(), failure).await;
                Ok(IngestOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn subscription_for(
        &self,
        preapproval_id: Option<&str>,
        external_reference: Option<&str>,
    ) -> AppResult<Option<Subscription>> {
        if let Some(id) = preapproval_id
            && let Some(subscription) = self.store.find_subscription_by_preapproval(id).await?
        {
            return Ok(Some(subscription));
        }
        match external_reference.and_then(|r| r.parse::<AgencyId>().ok()) {
            Some(agency_id) => self.store.find_subscription_by_agency(agency_id).await,
            None => Ok(None),
        }
    }

    async fn handle_payment(
        &self,
        payment_id: &str,
        notification_id: Option<String>,
    ) -> AppResult<IngestOutcome> {
        let Some(payment) = self.provider.get_payment(payment_id).await? else {
            return Ok(IngestOutcome::Ignored(format!("payment {payment_id} not found")));
        };
        let event_type = format!("payment.{}", payment.status.to_lowercase());
        if self.store.event_exists(&event_type, &payment.id).await? {
            return Ok(IngestOutcome::Duplicate);
        }

        let subscription = self
            .subscription_for(
                payment.preapproval_id.as_deref(),
                payment.external_reference.as_deref(),
            )
            .await?;
        let updated = subscription
            .as_ref()
            .and_then(|s| apply_payment_status(s, &payment.status, Utc::now()));

        let event = BillingEvent {
            id: BillingEventId::new(),
            agency_id: subscription.as_ref().map(|s| s.agency_id),
            subscription_id: subscription.as_ref().map(|s| s.id),
            event_type,
            mp_payment_id: Some(payment.id.clone()),
            mp_notification_id: notification_id,
            mp_preapproval_id: payment.preapproval_id.clone(),
            amount: payment.transaction_amount,
            payload: to_payload(&payment)?,
            created_at: Utc::now(),
        };
        self.record(&event, updated.as_ref()).await
    }

    async fn handle_preapproval(
        &self,
        preapproval_id: &str,
        notification_id: Option<String>,
    ) -> AppResult<IngestOutcome> {
        let Some(preapproval) = self.provider.get_preapproval(preapproval_id).await? else {
            return Ok(IngestOutcome::Ignored(format!(
                "preapproval {preapproval_id} not found"
            )));
        };
        let event_type = format!("preapproval.{}", preapproval.status.to_lowercase());
        let dedup_id = notification_id.as_deref().unwrap_or(&preapproval.id);
        if self.store.event_exists(&event_type, dedup_id).await? {
            return Ok(IngestOutcome::Duplicate);
        }

        let Some(subscription) = self
            .subscription_for(
                Some(&preapproval.id),
                preapproval.external_reference.as_deref(),
            )
            .await?
        else {
            return Ok(IngestOutcome::Ignored(format!(
                "no subscription for preapproval {}",
                preapproval.id
            )));
        };

        let mut updated = apply_preapproval_status(&subscription, &preapproval.status, Utc::now());
        if subscription.mp_preapproval_id.as_deref() != Some(preapproval.id.as_str()) {
            updated
                .get_or_insert_with(|| subscription.clone())
                .mp_preapproval_id = Some(preapproval.id.clone());
        }

        let event = BillingEvent {
            id: BillingEventId::new(),
            agency_id: Some(subscription.agency_id),
            subscription_id: Some(subscription.id),
            event_type,
            mp_payment_id: None,
            mp_notification_id: notification_id,
            mp_preapproval_id: Some(preapproval.id.clone()),
            amount: None,
            payload: to_payload(&preapproval)?,
            created_at: Utc::now(),
        };
        self.record(&event, updated.as_ref()).await
    }

    async fn record(
        &self,
        event: &BillingEvent,
        subscription: Option<&Subscription>,
    ) -> AppResult<IngestOutcome> {
        if !self.store.record_event(event, subscription).await? {
            return Ok(IngestOutcome::Duplicate);
        }
        info!(
            event_type = %event.event_type,
            agency_id = ?event.agency_id,
            status = ?subscription.map(|s| s.status),
            "billing event applied"
        );
        Ok(IngestOutcome::Applied)
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::provider::{ProviderPayment, ProviderPreapproval};
    use crate::billing::signature::{compute_signature, manifest};
    use crate::billing::subscription::SubscriptionStatus;
    use crate::testing::{FakePaymentProvider, InMemoryBilling, InMemoryFailureLog, subscription};
    use rust_decimal_macros::dec;

    const SECRET: &str = "whsec";

    struct Fixture {
        store: Arc<InMemoryBilling>,
        provider: Arc<FakePaymentProvider>,
        failures: Arc<InMemoryFailureLog>,
        ingestor: PaymentWebhookIngestor,
    }

    fn fixture(secret: Option<&str>, production: bool) -> Fixture {
        let store = Arc::new(InMemoryBilling::default());
        let provider = Arc::new(FakePaymentProvider::default());
        let failures = Arc::new(InMemoryFailureLog::default());
        let ingestor = PaymentWebhookIngestor::new(
            store.clone(),
            provider.clone(),
            failures.clone(),
            secret.map(str::to_string),
            production,
        );
        Fixture {
            store,
            provider,
            failures,
            ingestor,
        }
    }

    fn signed(body: &str, data_id: &str) -> PaymentWebhookRequest {
        let ts = "1704908010";
        let v1 = compute_signature(SECRET, &manifest(data_id, "req-1", ts));
        PaymentWebhookRequest {
            body: body.as_bytes().to_vec(),
            signature: Some(format!("ts={ts},v1={v1}")),
            request_id: Some("req-1".into()),
            query_data_id: None,
        }
    }

    fn payment(id: &str, status: &str, preapproval: &str) -> ProviderPayment {
        ProviderPayment {
            id: id.into(),
            status: status.into(),
            preapproval_id: Some(preapproval.into()),
            external_reference: None,
            transaction_amount: Some(dec!(15000)),
            currency_id: Some("ARS".into()),
            date_approved: None,
        }
    }

    #[tokio::test]
    async fn test_bad_signature_in_production_is_rejected() {
        let f = fixture(Some(SECRET), true);
        f.provider.add_payment(payment("77", "approved", "pre-1"));
        let body = r#"{"type":"payment","data":{"id":"77"}}"#;
        let mut request = signed(body, "77");
        request.signature = Some("ts=1704908010,v1=deadbeef".into());

        let err = f.ingestor.ingest(&request).await.unwrap_err();
        assert_eq!(AppError::from(err).status_code(), 401);
        assert!(f.store.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_accepted_outside_production() {
        let f = fixture(None, false);
        let mut sub = subscription(SubscriptionStatus::Unpaid);
        sub.mp_preapproval_id = Some("pre-1".into());
        f.store.add_subscription(sub);
        f.provider.add_payment(payment("77", "approved", "pre-1"));
        let request = PaymentWebhookRequest {
            body: br#"{"type":"payment","data":{"id":77}}"#.to_vec(),
            ..PaymentWebhookRequest::default()
        };

        let outcome = f.ingestor.ingest(&request).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Applied);
    }

    #[tokio::test]
    async fn test_missing_secret_rejected_in_production() {
        let f = fixture(None, true);
        let request = PaymentWebhookRequest {
            body: br#"{"type":"payment","data":{"id":"77"}}"#.to_vec(),
            ..PaymentWebhookRequest::default()
        };
        assert!(matches!(
            f.ingestor.ingest(&request).await,
            Err(WebhookError::SecretNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_records_one_event() {
        let f = fixture(Some(SECRET), true);
        let mut sub = subscription(SubscriptionStatus::PastDue);
        sub.mp_preapproval_id = Some("pre-1".into());
        sub.payment_attempts = 2;
        let sub_id = sub.id;
        f.store.add_subscription(sub);
        f.provider.add_payment(payment("77", "approved", "pre-1"));
        let request = signed(r#"{"id":1,"type":"payment","data":{"id":"77"}}"#, "77");

        assert_eq!(f.ingestor.ingest(&request).await.unwrap(), IngestOutcome::Applied);
        assert_eq!(f.ingestor.ingest(&request).await.unwrap(), IngestOutcome::Duplicate);

        let events = f.store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "payment.approved");
        assert_eq!(events[0].amount, Some(dec!(15000)));
        let stored = f.store.subscription(sub_id).unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.payment_attempts, 0);
    }

    #[tokio::test]
    async fn test_rejected_payment_marks_past_due() {
        let f = fixture(Some(SECRET), true);
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.mp_preapproval_id = Some("pre-1".into());
        let sub_id = sub.id;
        f.store.add_subscription(sub);
        f.provider.add_payment(payment("78", "rejected", "pre-1"));

        let outcome = f
            .ingestor
            .ingest(&signed(r#"{"type":"payment","data":{"id":"78"}}"#, "78"))
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Applied);
        let stored = f.store.subscription(sub_id).unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PastDue);
        assert_eq!(stored.payment_attempts, 1);
    }

    #[tokio::test]
    async fn test_preapproval_found_by_external_reference() {
        let f = fixture(Some(SECRET), true);
        let sub = subscription(SubscriptionStatus::Active);
        let (sub_id, agency_id) = (sub.id, sub.agency_id);
        f.store.add_subscription(sub);
        f.provider.add_preapproval(ProviderPreapproval {
            id: "pre-9".into(),
            status: "paused".into(),
            external_reference: Some(agency_id.to_string()),
            next_payment_date: None,
        });

        let outcome = f
            .ingestor
            .ingest(&signed(
                r#"{"type":"subscription_preapproval","data":{"id":"pre-9"}}"#,
                "pre-9",
            ))
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Applied);
        let stored = f.store.subscription(sub_id).unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Suspended);
        assert_eq!(stored.mp_preapproval_id.as_deref(), Some("pre-9"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_logged_not_raised() {
        let f = fixture(Some(SECRET), true);
        f.provider.fail_with("provider down");
        let outcome = f
            .ingestor
            .ingest(&signed(r#"{"type":"payment","data":{"id":"77"}}"#, "77"))
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Failed(_)));

        let failures = f.failures.entries();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].external_id.as_deref(), Some("77"));
        assert_eq!(failures[0].event_type.as_deref(), Some("payment"));
        assert!(f.store.events().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_is_ignored() {
        let f = fixture(Some(SECRET), true);
        let outcome = f
            .ingestor
            .ingest(&signed(r#"{"type":"plan","data":{"id":"5"}}"#, "5"))
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Ignored(_)));
        assert!(f.failures.entries().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_body_uses_query_id_and_is_logged() {
        let f = fixture(Some(SECRET), true);
        let mut request = signed("not json", "77");
        request.query_data_id = Some("77".into());
        let outcome = f.ingestor.ingest(&request).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Failed(_)));
        assert_eq!(f.failures.entries().len(), 1);
    }
}
