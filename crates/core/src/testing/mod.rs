//! In-memory stores, scripted external services and fixtures.
//!
//! Compiled for unit tests and, behind the `test-support` feature, for the
//! router tests of `tesoro-api`.

#![allow(clippy::missing_panics_doc, missing_docs)]

mod fiscal;
mod ledger;
mod operation;
mod webhooks;

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use tesoro_shared::types::{
    AgencyId, Currency, FinancialAccountId, InvoiceId, MovementId, OperationId, SubscriptionId,
    UserId,
};

pub use fiscal::{FakeAutomation, FakeFiscalBridge, InMemoryFiscalSettings, InMemoryInvoices};
pub use ledger::{InMemoryExchangeRates, InMemoryLedger};
pub use operation::{FailingIva, InMemoryIva, InMemoryOperations, InMemoryOperatorPayments};
pub use webhooks::{
    FakeCardBoardApi, FakePaymentProvider, InMemoryBilling, InMemoryCardBoard, InMemoryFailureLog,
};

use crate::billing::{Subscription, SubscriptionStatus};
use crate::fiscal::{Concept, Invoice, InvoiceStatus, IvaRateBucket, VoucherType, iva_line};
use crate::ledger::{LedgerMovement, MovementType, PaymentMethod};
use crate::onboarding::OnboardingRequest;
use crate::operation::OperationFinancials;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A movement created now; USD amounts carry a rate of 1000.
#[must_use]
pub fn movement(
    agency_id: AgencyId,
    movement_type: MovementType,
    currency: Currency,
    amount: Decimal,
) -> LedgerMovement {
    let (exchange_rate, amount_ars_equivalent) = if currency.is_base() {
        (None, amount)
    } else {
        let rate = Decimal::from(1000);
        (Some(rate), amount * rate)
    };
    let created_at = Utc::now();
    LedgerMovement {
        id: MovementId::new(),
        agency_id,
        operation_id: None,
        lead_id: None,
        movement_type,
        concept: "test".to_string(),
        currency,
        amount_original: amount,
        exchange_rate,
        amount_ars_equivalent,
        method: PaymentMethod::Cash,
        account_id: FinancialAccountId::new(),
        cash_box_id: None,
        operator_id: None,
        seller_id: None,
        movement_date: created_at.date_naive(),
        created_by: UserId::new(),
        created_at,
    }
}

/// A USD operation with no operator.
#[must_use]
pub fn operation_financials(sale_amount: Decimal, operator_cost: Decimal) -> OperationFinancials {
    OperationFinancials {
        agency_id: AgencyId::new(),
        operation_id: OperationId::new(),
        sale_amount,
        sale_currency: Currency::Usd,
        operator_cost,
        operator_cost_currency: Currency::Usd,
        operator_id: None,
        exchange_rate: None,
        payment_due_date: None,
    }
}

/// A balanced class B draft: 1000 net at 21% to a final consumer, in ARS.
#[must_use]
pub fn draft_invoice(agency_id: AgencyId, pto_vta: i32) -> Invoice {
    let net = Decimal::from(1000);
    let line = iva_line(IvaRateBucket::TwentyOne, net);
    Invoice {
        id: InvoiceId::new(),
        agency_id,
        operation_id: None,
        customer_id: None,
        cbte_tipo: VoucherType::FacturaB,
        pto_vta,
        cbte_nro: None,
        cae: None,
        cae_fch_vto: None,
        concepto: Concept::Products,
        doc_tipo: 99,
        doc_nro: 0,
        imp_neto: net,
        imp_iva: line.amount,
        imp_op_ex: Decimal::ZERO,
        imp_tot_conc: Decimal::ZERO,
        imp_trib: Decimal::ZERO,
        imp_total: net + line.amount,
        iva_lines: vec![line],
        moneda: Currency::Ars,
        moneda_cotizacion: None,
        fch_serv_desde: None,
        fch_serv_hasta: None,
        fch_vto_pago: None,
        status: InvoiceStatus::Draft,
        fecha_emision: None,
        observations: Vec::new(),
    }
}

/// Onboarding inputs with alias `tesoro`.
#[must_use]
pub fn onboarding_request() -> OnboardingRequest {
    OnboardingRequest {
        cuit: 20_123_456_789,
        pto_vta: 1,
        username: "20123456789".to_string(),
        password: "clave".to_string(),
        alias: "tesoro".to_string(),
        service: "wsfe".to_string(),
    }
}

/// A subscription of a fresh agency with no trial and no preapproval.
#[must_use]
pub fn subscription(status: SubscriptionStatus) -> Subscription {
    Subscription {
        id: SubscriptionId::new(),
        agency_id: AgencyId::new(),
        plan_id: "pro".to_string(),
        status,
        mp_preapproval_id: None,
        mp_status: None,
        current_period_start: None,
        current_period_end: None,
        trial_start: None,
        trial_end: None,
        payment_attempts: 0,
    }
}
