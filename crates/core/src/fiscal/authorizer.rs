//! Invoice authorization against the tax authority.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tesoro_shared::types::{AgencyId, InvoiceId};
use tesoro_shared::{AppError, AppResult};
use tracing::{info, instrument, warn};

use super::breakdown::{build_voucher_request, validate_totals};
use super::bridge::FiscalBridge;
use super::error::FiscalError;
use super::lock::{AllocationKey, AllocationLock};
use super::settings::FiscalSettingsStore;
use super::types::{AuthorityOutcome, Invoice, InvoiceStatus};

/// Storage of invoices.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Finds an invoice.
    async fn find(&self, agency_id: AgencyId, id: InvoiceId) -> AppResult<Option<Invoice>>;

    /// Persists the mutable fields of an existing invoice.
    async fn update(&self, invoice: &Invoice) -> AppResult<()>;
}

/// Obtains CAEs for invoices, one allocation per numbering sequence at a time.
pub struct InvoiceAuthorizer {
    invoices: Arc<dyn InvoiceStore>,
    settings: Arc<dyn FiscalSettingsStore>,
    bridge: Arc<dyn FiscalBridge>,
    lock: Arc<dyn AllocationLock>,
    timeout: Duration,
}

impl InvoiceAuthorizer {
    /// Creates an authorizer. `timeout` bounds each authority call.
    #[must_use]
    pub fn new(
        invoices: Arc<dyn InvoiceStore>,
        settings: Arc<dyn FiscalSettingsStore>,
        bridge: Arc<dyn FiscalBridge>,
        lock: Arc<dyn AllocationLock>,
        timeout: Duration,
    ) -> Self {
        Self {
            invoices,
            settings,
            bridge,
            lock,
            timeout,
        }
    }

    /// Authorizes an invoice.
    ///
    /// A rejection is not an error: the invoice comes back `rejected` with
    /// the attempted number kept for audit and no CAE. Transport failures
    /// and timeouts put the invoice back to `pending` and return an error;
    /// a retry queries the last number again.
    ///
    /// # Errors
    ///
    /// Returns `FiscalError` for unknown invoices, invalid statuses or
    /// breakdowns, missing settings, and authority failures.
    #[instrument(skip(self))]
    pub async fn authorize(
        &self,
        agency_id: AgencyId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, FiscalError> {
        let invoice = self.load(agency_id, invoice_id).await?;
        if !invoice.status.can_authorize() {
            return Err(FiscalError::InvalidStatus(invoice.status));
        }
        validate_totals(&invoice)?;
        let settings = self
            .settings
            .find(agency_id)
            .await?
            .ok_or(FiscalError::NotConfigured(agency_id))?;
        let credentials = settings.credentials();

        let key = AllocationKey {
            agency_id,
            pto_vta: invoice.pto_vta,
            cbte_tipo: invoice.cbte_tipo,
        };
        let _guard = self.lock.acquire(key).await?;

        // Another attempt may have finished while we waited.
        let mut invoice = self.load(agency_id, invoice_id).await?;
        if !invoice.status.can_authorize() {
            return Err(FiscalError::InvalidStatus(invoice.status));
        }
        if invoice.status == InvoiceStatus::Sent {
            warn!(invoice_id = %invoice.id, "resuming interrupted authorization attempt");
        }
        invoice.status = InvoiceStatus::Sent;
        self.invoices.update(&invoice).await?;

        let last = match self
            .call(
                "last voucher query",
                self.bridge
                    .last_authorized(&credentials, invoice.pto_vta, invoice.cbte_tipo),
            )
            .await
        {
            Ok(last) => last,
            Err(e) => return Err(self.revert(invoice, e).await),
        };
        let next = last + 1;
        let issue_date = today();
        let request = match build_voucher_request(&invoice, next, issue_date) {
            Ok(request) => request,
            Err(e) => return Err(self.revert(invoice, e).await),
        };

        let response = match self
            .call(
                "authorization request",
                self.bridge.request_authorization(&credentials, &request),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.revert(invoice, e).await),
        };

        invoice.cbte_nro = Some(next);
        invoice.fecha_emision = Some(issue_date);
        match response.outcome() {
            AuthorityOutcome::Approved {
                cae,
                expires_on,
                messages,
            } => {
                info!(cbte_nro = next, %cae, "invoice authorized");
                invoice.status = InvoiceStatus::Authorized;
                invoice.cae = Some(cae);
                invoice.cae_fch_vto = expires_on;
                invoice.observations = messages;
            }
            AuthorityOutcome::Rejected { messages } => {
                warn!(
                    cbte_nro = next,
                    messages = ?messages,
                    "invoice rejected by the fiscal authority"
                );
                invoice.status = InvoiceStatus::Rejected;
                invoice.cae = None;
                invoice.cae_fch_vto = None;
                invoice.observations = messages;
            }
        }
        self.invoices.update(&invoice).await?;
        Ok(invoice)
    }

    async fn load(&self, agency_id: AgencyId, id: InvoiceId) -> Result<Invoice, FiscalError> {
        self.invoices
            .find(agency_id, id)
            .await?
            .ok_or(FiscalError::InvoiceNotFound(id))
    }

    async fn call<T, F>(&self, stage: &'static str, fut: F) -> Result<T, FiscalError>
    where
        F: Future<Output = AppResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(AppError::ExternalService(msg))) => Err(FiscalError::Bridge(msg)),
            Ok(Err(other)) => Err(FiscalError::Bridge(other.to_string())),
            Err(_) => Err(FiscalError::Timeout(stage)),
        }
    }

    /// Puts an in-flight invoice back to `pending` after a failed round-trip.
    async fn revert(&self, mut invoice: Invoice, cause: FiscalError) -> FiscalError {
        warn!(invoice_id = %invoice.id, error = %cause, "authorization round-trip failed");
        invoice.status = InvoiceStatus::Pending;
        if let Err(e) = self.invoices.update(&invoice).await {
            warn!(invoice_id = %invoice.id, error = %e, "could not revert invoice to pending");
        }
        cause
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
