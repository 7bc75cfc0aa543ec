use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tesoro_shared::types::{AgencyId, LeadId, SubscriptionId};
use tesoro_shared::{AppError, AppResult};

use super::lock;
use crate::billing::{
    BillingEvent, BillingStore, PaymentProvider, ProviderPayment, ProviderPreapproval,
    Subscription,
};
use crate::cardboard::{BoardSettings, CardBoardApi, CardBoardStore, LeadFromCard, RemoteCard};
use crate::webhook::{WebhookFailure, WebhookFailureLog};

#[derive(Default)]
struct BillingState {
    events: Vec<BillingEvent>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

/// Billing store with the same dedup rule as the unique index.
#[derive(Default)]
pub struct InMemoryBilling {
    state: Mutex<BillingState>,
}

impl InMemoryBilling {
    pub fn add_subscription(&self, subscription: Subscription) {
        lock(&self.state)
            .subscriptions
            .insert(subscription.id, subscription);
    }

    pub fn subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        lock(&self.state).subscriptions.get(&id).cloned()
    }

    pub fn events(&self) -> Vec<BillingEvent> {
        lock(&self.state).events.clone()
    }
}

#[async_trait]
impl BillingStore for InMemoryBilling {
    async fn event_exists(&self, event_type: &str, external_id: &str) -> AppResult<bool> {
        Ok(lock(&self.state)
            .events
            .iter()
            .any(|e| e.dedup_key() == (event_type, Some(external_id))))
    }

    async fn record_event(
        &self,
        event: &BillingEvent,
        subscription: Option<&Subscription>,
    ) -> AppResult<bool> {
        let mut state = lock(&self.state);
        if state.events.iter().any(|e| e.dedup_key() == event.dedup_key()) {
            return Ok(false);
        }
        state.events.push(event.clone());
        if let Some(s) = subscription {
            state.subscriptions.insert(s.id, s.clone());
        }
        Ok(true)
    }

    async fn find_subscription_by_preapproval(
        &self,
        preapproval_id: &str,
    ) -> AppResult<Option<Subscription>> {
        Ok(lock(&self.state)
            .subscriptions
            .values()
            .find(|s| s.mp_preapproval_id.as_deref() == Some(preapproval_id))
            .cloned())
    }

    async fn find_subscription_by_agency(
        &self,
        agency_id: AgencyId,
    ) -> AppResult<Option<Subscription>> {
        Ok(lock(&self.state)
            .subscriptions
            .values()
            .find(|s| s.agency_id == agency_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct FakePaymentProvider {
    payments: Mutex<HashMap<String, ProviderPayment>>,
    preapprovals: Mutex<HashMap<String, ProviderPreapproval>>,
    failure: Mutex<Option<String>>,
}

impl FakePaymentProvider {
    pub fn add_payment(&self, payment: ProviderPayment) {
        lock(&self.payments).insert(payment.id.clone(), payment);
    }

    pub fn add_preapproval(&self, preapproval: ProviderPreapproval) {
        lock(&self.preapprovals).insert(preapproval.id.clone(), preapproval);
    }

    /// Makes every later call fail with an external-service error.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    fn check(&self) -> AppResult<()> {
        match lock(&self.failure).as_ref() {
            Some(message) => Err(AppError::ExternalService(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn get_payment(&self, id: &str) -> AppResult<Option<ProviderPayment>> {
        self.check()?;
        Ok(lock(&self.payments).get(id).cloned())
    }

    async fn get_preapproval(&self, id: &str) -> AppResult<Option<ProviderPreapproval>> {
        self.check()?;
        Ok(lock(&self.preapprovals).get(id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryFailureLog {
    entries: Mutex<Vec<WebhookFailure>>,
}

impl InMemoryFailureLog {
    pub fn entries(&self) -> Vec<WebhookFailure> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl WebhookFailureLog for InMemoryFailureLog {
    async fn record(&self, failure: &WebhookFailure) -> AppResult<()> {
        lock(&self.entries).push(failure.clone());
        Ok(())
    }
}

#[derive(Default)]
struct CardBoardState {
    boards: HashMap<String, BoardSettings>,
    processed: HashSet<String>,
    leads: HashMap<(AgencyId, String), (LeadId, LeadFromCard)>,
}

#[derive(Default)]
pub struct InMemoryCardBoard {
    state: Mutex<CardBoardState>,
}

impl InMemoryCardBoard {
    pub fn configure_board(&self, agency_id: AgencyId, board_id: &str, lists: &[(&str, &str)]) {
        let settings = BoardSettings {
            agency_id,
            board_id: board_id.to_string(),
            list_status: lists
                .iter()
                .map(|(list, status)| ((*list).to_string(), (*status).to_string()))
                .collect(),
        };
        lock(&self.state)
            .boards
            .insert(board_id.to_string(), settings);
    }

    pub fn lead(&self, agency_id: AgencyId, card_id: &str) -> Option<LeadFromCard> {
        lock(&self.state)
            .leads
            .get(&(agency_id, card_id.to_string()))
            .map(|(_, lead)| lead.clone())
    }
}

#[async_trait]
impl CardBoardStore for InMemoryCardBoard {
    async fn settings_for_board(&self, board_id: &str) -> AppResult<Option<BoardSettings>> {
        Ok(lock(&self.state).boards.get(board_id).cloned())
    }

    async fn action_processed(&self, action_id: &str) -> AppResult<bool> {
        Ok(lock(&self.state).processed.contains(action_id))
    }

    async fn mark_action_processed(
        &self,
        _agency_id: AgencyId,
        action_id: &str,
        _action_type: &str,
    ) -> AppResult<()> {
        lock(&self.state).processed.insert(action_id.to_string());
        Ok(())
    }

    async fn upsert_lead_from_card(&self, lead: &LeadFromCard) -> AppResult<LeadId> {
        let mut state = lock(&self.state);
        let key = (lead.agency_id, lead.card_id.clone());
        let id = state.leads.get(&key).map_or_else(LeadId::new, |(id, _)| *id);
        state.leads.insert(key, (id, lead.clone()));
        Ok(id)
    }

    async fn delete_lead_by_card(&self, agency_id: AgencyId, card_id: &str) -> AppResult<bool> {
        Ok(lock(&self.state)
            .leads
            .remove(&(agency_id, card_id.to_string()))
            .is_some())
    }
}

#[derive(Default)]
pub struct FakeCardBoardApi {
    cards: Mutex<HashMap<String, RemoteCard>>,
    failure: Mutex<Option<String>>,
    fetches: AtomicUsize,
}

impl FakeCardBoardApi {
    pub fn put_card(&self, card: RemoteCard) {
        lock(&self.cards).insert(card.id.clone(), card);
    }

    pub fn remove_card(&self, card_id: &str) {
        lock(&self.cards).remove(card_id);
    }

    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardBoardApi for FakeCardBoardApi {
    async fn fetch_card(&self, card_id: &str) -> AppResult<Option<RemoteCard>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = lock(&self.failure).as_ref() {
            return Err(AppError::ExternalService(message.clone()));
        }
        Ok(lock(&self.cards).get(card_id).cloned())
    }
}
