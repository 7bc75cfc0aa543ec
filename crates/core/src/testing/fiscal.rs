use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tesoro_shared::types::{AgencyId, InvoiceId};
use tesoro_shared::{AppError, AppResult};

use super::lock;
use crate::fiscal::{
    AuthorityMessage, AuthorityResponse, FiscalBridge, FiscalCredentials, FiscalEnvironment,
    FiscalSettings, FiscalSettingsStore, Invoice, InvoiceStore, VoucherRequest, VoucherType,
    blocks_new_claim,
};
use crate::onboarding::{
    AutomationBridge, AutomationKind, AutomationReply, AutomationStatus, OnboardingRequest,
    OnboardingState,
};

#[derive(Default)]
pub struct InMemoryInvoices {
    invoices: Mutex<HashMap<InvoiceId, Invoice>>,
}

impl InMemoryInvoices {
    pub fn insert(&self, invoice: Invoice) -> Invoice {
        lock(&self.invoices).insert(invoice.id, invoice.clone());
        invoice
    }

    pub fn get(&self, id: InvoiceId) -> Option<Invoice> {
        lock(&self.invoices).get(&id).cloned()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoices {
    async fn find(&self, agency_id: AgencyId, id: InvoiceId) -> AppResult<Option<Invoice>> {
        Ok(self.get(id).filter(|i| i.agency_id == agency_id))
    }

    async fn update(&self, invoice: &Invoice) -> AppResult<()> {
        let mut invoices = lock(&self.invoices);
        let slot = invoices
            .get_mut(&invoice.id)
            .ok_or_else(|| AppError::NotFound(format!("invoice {}", invoice.id)))?;
        *slot = invoice.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFiscalSettings {
    settings: Mutex<HashMap<AgencyId, FiscalSettings>>,
}

impl InMemoryFiscalSettings {
    fn onboarded(agency_id: AgencyId) -> FiscalSettings {
        FiscalSettings {
            agency_id,
            cuit: 20_123_456_789,
            pto_vta: 1,
            environment: FiscalEnvironment::Dev,
            cert_alias: Some("tesoro".to_string()),
            onboarding: OnboardingState::Complete,
            onboarding_error: None,
            onboarding_started_at: None,
        }
    }

    /// Stores completed settings for the agency.
    pub fn configure(&self, agency_id: AgencyId) {
        lock(&self.settings).insert(agency_id, Self::onboarded(agency_id));
    }

    pub fn set_state(&self, agency_id: AgencyId, state: OnboardingState) {
        self.set_claim(agency_id, state, Utc::now());
    }

    /// Sets the onboarding state as if a run had been claimed at `started_at`.
    pub fn set_claim(&self, agency_id: AgencyId, state: OnboardingState, started_at: DateTime<Utc>) {
        let mut settings = lock(&self.settings);
        let entry = settings
            .entry(agency_id)
            .or_insert_with(|| Self::onboarded(agency_id));
        entry.onboarding = state;
        entry.onboarding_started_at = Some(started_at);
    }
}

#[async_trait]
impl FiscalSettingsStore for InMemoryFiscalSettings {
    async fn find(&self, agency_id: AgencyId) -> AppResult<Option<FiscalSettings>> {
        Ok(lock(&self.settings).get(&agency_id).cloned())
    }

    async fn save(&self, settings: &FiscalSettings) -> AppResult<()> {
        lock(&self.settings).insert(settings.agency_id, settings.clone());
        Ok(())
    }

    async fn claim_onboarding(
        &self,
        settings: &FiscalSettings,
        reclaim_before: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut stored = lock(&self.settings);
        if stored
            .get(&settings.agency_id)
            .is_some_and(|existing| blocks_new_claim(existing, reclaim_before))
        {
            return Ok(false);
        }
        stored.insert(settings.agency_id, settings.clone());
        Ok(true)
    }
}

#[derive(Clone)]
enum BridgeMode {
    Approving,
    Rejecting(AuthorityMessage),
}

struct BridgeState {
    mode: BridgeMode,
    last: HashMap<(i32, i32), i64>,
    last_queries: usize,
    duplicates: usize,
}

/// Authority double that only approves the next number in sequence.
pub struct FakeFiscalBridge {
    state: Mutex<BridgeState>,
    delay: Duration,
}

impl FakeFiscalBridge {
    fn with_mode(mode: BridgeMode) -> Self {
        Self {
            state: Mutex::new(BridgeState {
                mode,
                last: HashMap::new(),
                last_queries: 0,
                duplicates: 0,
            }),
            delay: Duration::ZERO,
        }
    }

    pub fn approving() -> Self {
        Self::with_mode(BridgeMode::Approving)
    }

    pub fn rejecting(code: i64, message: &str) -> Self {
        Self::with_mode(BridgeMode::Rejecting(AuthorityMessage {
            code,
            message: message.to_string(),
        }))
    }

    /// Sleeps before answering every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_last(&self, pto_vta: i32, cbte_tipo: VoucherType, number: i64) {
        lock(&self.state)
            .last
            .insert((pto_vta, cbte_tipo.code()), number);
    }

    pub fn approve_from_now_on(&self) {
        lock(&self.state).mode = BridgeMode::Approving;
    }

    /// Number of last-authorized queries answered.
    pub fn last_queries(&self) -> usize {
        lock(&self.state).last_queries
    }

    /// Requests for a number that was already authorized.
    pub fn duplicate_requests(&self) -> usize {
        lock(&self.state).duplicates
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn rejected(message: AuthorityMessage) -> AuthorityResponse {
    AuthorityResponse {
        resultado: "R".to_string(),
        cae: None,
        cae_fch_vto: None,
        observations: vec![message],
        errors: Vec::new(),
    }
}

#[async_trait]
impl FiscalBridge for FakeFiscalBridge {
    async fn last_authorized(
        &self,
        _credentials: &FiscalCredentials,
        pto_vta: i32,
        cbte_tipo: VoucherType,
    ) -> AppResult<i64> {
        self.pause().await;
        let mut state = lock(&self.state);
        state.last_queries += 1;
        Ok(state
            .last
            .get(&(pto_vta, cbte_tipo.code()))
            .copied()
            .unwrap_or(0))
    }

    async fn request_authorization(
        &self,
        _credentials: &FiscalCredentials,
        request: &VoucherRequest,
    ) -> AppResult<AuthorityResponse> {
        self.pause().await;
        let mut state = lock(&self.state);
        let key = (request.pto_vta, request.cbte_tipo);
        let last = state.last.get(&key).copied().unwrap_or(0);
        if request.cbte_nro <= last {
            state.duplicates += 1;
        }
        if let BridgeMode::Rejecting(message) = &state.mode {
            return Ok(rejected(message.clone()));
        }
        if request.cbte_nro != last + 1 {
            return Ok(rejected(AuthorityMessage {
                code: 10016,
                message: format!("El numero debe ser {}", last + 1),
            }));
        }
        state.last.insert(key, request.cbte_nro);
        Ok(AuthorityResponse {
            resultado: "A".to_string(),
            cae: Some(format!("75{:012}", request.cbte_nro)),
            cae_fch_vto: request.cbte_fch.checked_add_days(chrono::Days::new(10)),
            observations: Vec::new(),
            errors: Vec::new(),
        })
    }
}

#[derive(Default)]
struct AutomationScript {
    submits: HashMap<AutomationKind, AutomationReply>,
    polls: HashMap<String, VecDeque<AutomationReply>>,
    submitted: Vec<AutomationKind>,
    poll_count: usize,
}

/// Automation API double driven by scripted replies.
///
/// Unscripted polls report the job as still running.
#[derive(Default)]
pub struct FakeAutomation {
    script: Mutex<AutomationScript>,
}

impl FakeAutomation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete() -> AutomationReply {
        AutomationReply {
            status: AutomationStatus::Complete,
            job_id: None,
            data: Some(serde_json::json!({ "status": "created" })),
            message: None,
        }
    }

    pub fn running(job_id: &str) -> AutomationReply {
        AutomationReply {
            status: AutomationStatus::InProcess,
            job_id: Some(job_id.to_string()),
            data: None,
            message: None,
        }
    }

    pub fn failed(message: &str) -> AutomationReply {
        AutomationReply {
            status: AutomationStatus::Error,
            job_id: None,
            data: None,
            message: Some(message.to_string()),
        }
    }

    pub fn script_submit(&self, kind: AutomationKind, reply: AutomationReply) {
        lock(&self.script).submits.insert(kind, reply);
    }

    pub fn script_polls(&self, job_id: &str, replies: Vec<AutomationReply>) {
        lock(&self.script)
            .polls
            .insert(job_id.to_string(), replies.into());
    }

    pub fn poll_count(&self) -> usize {
        lock(&self.script).poll_count
    }

    pub fn submitted(&self) -> Vec<AutomationKind> {
        lock(&self.script).submitted.clone()
    }
}

#[async_trait]
impl AutomationBridge for FakeAutomation {
    async fn submit(
        &self,
        kind: AutomationKind,
        _request: &OnboardingRequest,
    ) -> AppResult<AutomationReply> {
        let mut script = lock(&self.script);
        script.submitted.push(kind);
        script.submits.get(&kind).cloned().ok_or_else(|| {
            AppError::ExternalService(format!("no scripted reply for {}", kind.automation_name()))
        })
    }

    async fn poll(&self, job_id: &str) -> AppResult<AutomationReply> {
        let mut script = lock(&self.script);
        script.poll_count += 1;
        Ok(script
            .polls
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Self::running(job_id)))
    }
}
