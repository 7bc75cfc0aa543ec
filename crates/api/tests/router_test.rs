//! Router tests against in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tesoro_api::{AppState, create_router};
use tesoro_core::billing::{PaymentWebhookIngestor, compute_signature, manifest};
use tesoro_core::cardboard::CardBoardWebhookIngestor;
use tesoro_core::currency::ExchangeRateResolver;
use tesoro_core::fiscal::{InvoiceAuthorizer, LocalAllocationLocks};
use tesoro_core::iva::IvaService;
use tesoro_core::ledger::{BalanceProjector, LedgerService};
use tesoro_core::onboarding::{OnboardingPoller, OnboardingService, PollPolicy};
use tesoro_core::operation::OperationFinancialsService;
use tesoro_core::signal::{DashboardSignal, NoopSignal};
use tesoro_core::testing::{
    FakeAutomation, FakeCardBoardApi, FakeFiscalBridge, FakePaymentProvider, InMemoryBilling,
    InMemoryCardBoard, InMemoryExchangeRates, InMemoryFailureLog, InMemoryFiscalSettings,
    InMemoryInvoices, InMemoryIva, InMemoryLedger, InMemoryOperations, InMemoryOperatorPayments,
    draft_invoice,
};
use tesoro_shared::types::{AgencyId, Currency};
use tesoro_shared::{JwtConfig, JwtService};
use tower::ServiceExt;
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec_test";

struct Harness {
    router: Router,
    jwt: Arc<JwtService>,
    ledger: Arc<InMemoryLedger>,
    invoices: Arc<InMemoryInvoices>,
    settings: Arc<InMemoryFiscalSettings>,
    failures: Arc<InMemoryFailureLog>,
    agency_id: AgencyId,
}

impl Harness {
    fn new(production: bool) -> Self {
        let jwt = Arc::new(JwtService::new(JwtConfig {
            secret: "router-test-secret".to_string(),
            access_token_expires_minutes: 5,
        }));
        let signal: Arc<dyn DashboardSignal> = Arc::new(NoopSignal);

        let rates = Arc::new(ExchangeRateResolver::new(
            Arc::new(InMemoryExchangeRates::default()),
            None,
        ));
        let ledger = Arc::new(InMemoryLedger::default());
        let ledger_service = Arc::new(LedgerService::new(
            ledger.clone(),
            rates.clone(),
            signal.clone(),
            false,
        ));
        let iva = Arc::new(IvaService::new(Arc::new(InMemoryIva::default())));
        let operations = Arc::new(OperationFinancialsService::new(
            Arc::new(InMemoryOperations::default()),
            iva.clone(),
            Arc::new(InMemoryOperatorPayments::default()),
            ledger_service.clone(),
            signal,
        ));

        let invoices = Arc::new(InMemoryInvoices::default());
        let settings = Arc::new(InMemoryFiscalSettings::default());
        let authorizer = Arc::new(InvoiceAuthorizer::new(
            invoices.clone(),
            settings.clone(),
            Arc::new(FakeFiscalBridge::approving()),
            Arc::new(LocalAllocationLocks::new()),
            Duration::from_secs(1),
        ));
        let poller = Arc::new(OnboardingPoller::new(
            Arc::new(FakeAutomation::new()),
            PollPolicy {
                interval: Duration::from_millis(1),
                max_attempts: 2,
            },
        ));
        let onboarding = Arc::new(OnboardingService::new(settings.clone(), poller));

        let failures = Arc::new(InMemoryFailureLog::default());
        let payment_webhooks = Arc::new(PaymentWebhookIngestor::new(
            Arc::new(InMemoryBilling::default()),
            Arc::new(FakePaymentProvider::default()),
            failures.clone(),
            Some(WEBHOOK_SECRET.to_string()),
            production,
        ));
        let card_webhooks = Arc::new(CardBoardWebhookIngestor::new(
            Arc::new(InMemoryCardBoard::default()),
            Arc::new(FakeCardBoardApi::default()),
            failures.clone(),
            Some(WEBHOOK_SECRET.to_string()),
            None,
            production,
        ));

        let state = AppState {
            jwt_service: jwt.clone(),
            rates,
            ledger: ledger_service,
            balances: Arc::new(BalanceProjector::new(ledger.clone())),
            iva,
            operations,
            invoices: authorizer,
            onboarding,
            payment_webhooks,
            card_webhooks,
        };

        Self {
            router: create_router(state),
            jwt,
            ledger,
            invoices,
            settings,
            failures,
            agency_id: AgencyId::new(),
        }
    }

    fn token(&self, role: &str) -> String {
        self.jwt
            .generate_access_token(Uuid::new_v4(), vec![self.agency_id.into_inner()], role)
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, role: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token(role)));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let h = Harness::new(false);
    let (status, body) = h
        .send(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let h = Harness::new(false);
    let uri = format!("/api/v1/agencies/{}/fiscal/onboarding", h.agency_id);
    let (status, body) = h
        .send(Request::get(uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_token");
}

#[tokio::test]
async fn test_foreign_agency_is_forbidden() {
    let h = Harness::new(false);
    let uri = format!("/api/v1/agencies/{}/fiscal/onboarding", Uuid::new_v4());
    let (status, body) = h.call(Method::GET, &uri, "seller", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_recorded_movement_moves_cash_box() {
    let h = Harness::new(false);
    let account_id = h.ledger.add_account(h.agency_id, Currency::Ars, dec!(0));
    let cash_box_id = h.ledger.add_cash_box(h.agency_id, Currency::Ars, dec!(1000));

    let (status, movement) = h
        .call(
            Method::POST,
            &format!("/api/v1/agencies/{}/movements", h.agency_id),
            "seller",
            Some(json!({
                "movement_type": "INCOME",
                "concept": "Seña Bariloche",
                "currency": "ARS",
                "amount": "500",
                "method": "CASH",
                "account_id": account_id,
                "cash_box_id": cash_box_id,
                "movement_date": "2026-10-16"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(movement["amount_ars_equivalent"], "500");

    let (status, balance) = h
        .call(
            Method::GET,
            &format!(
                "/api/v1/agencies/{}/cash-boxes/{cash_box_id}/balance",
                h.agency_id
            ),
            "seller",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance"]["amount"], "1500");
    assert_eq!(balance["cached"], "1500");
    assert_eq!(balance["drift"], false);
}

#[tokio::test]
async fn test_movement_validation_errors() {
    let h = Harness::new(false);
    let account_id = h.ledger.add_account(h.agency_id, Currency::Usd, dec!(0));
    let uri = format!("/api/v1/agencies/{}/movements", h.agency_id);
    let movement = |amount: &str| {
        json!({
            "movement_type": "EXPENSE",
            "concept": "Hotel",
            "currency": "USD",
            "amount": amount,
            "method": "BANK",
            "account_id": account_id,
            "movement_date": "2026-10-16"
        })
    };

    let (status, body) = h
        .call(Method::POST, &uri, "seller", Some(movement("0")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // No stored rate and no fallback.
    let (status, body) = h
        .call(Method::POST, &uri, "seller", Some(movement("120")))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "exchange_rate_unavailable");
    assert!(h.ledger.movements().is_empty());
}

#[tokio::test]
async fn test_exchange_rate_upsert_requires_admin() {
    let h = Harness::new(false);
    let rate = json!({ "effective_date": "2026-10-16", "rate": "1450.5" });

    let (status, _) = h
        .call(Method::PUT, "/api/v1/exchange-rates", "seller", Some(rate.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .call(Method::PUT, "/api/v1/exchange-rates", "admin", Some(rate))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .call(
            Method::GET,
            "/api/v1/exchange-rates?date=2026-10-20",
            "seller",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rate"], "1450.5");
    assert_eq!(body["source"], "on_or_before");
    assert_eq!(body["degraded"], false);
}

#[tokio::test]
async fn test_invoice_authorization() {
    let h = Harness::new(false);
    let invoice = h.invoices.insert(draft_invoice(h.agency_id, 1));
    let uri = format!(
        "/api/v1/agencies/{}/invoices/{}/authorize",
        h.agency_id, invoice.id
    );

    let (status, body) = h.call(Method::POST, &uri, "seller", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "business_rule_violation");

    h.settings.configure(h.agency_id);
    let (status, body) = h.call(Method::POST, &uri, "seller", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "authorized");
    assert_eq!(body["cbte_nro"], 1);
    assert!(body["cae"].is_string());

    let (status, body) = h.call(Method::POST, &uri, "seller", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "business_rule_violation");
    assert!(body.get("retryable").is_none());
}

#[tokio::test]
async fn test_operation_sync_reports_side_effects() {
    let h = Harness::new(false);
    let uri = format!(
        "/api/v1/agencies/{}/operations/{}/financials",
        h.agency_id,
        Uuid::new_v4()
    );

    let (status, body) = h
        .call(
            Method::PUT,
            &uri,
            "seller",
            Some(json!({
                "sale_amount": "3000",
                "sale_currency": "USD",
                "operator_cost": "2000",
                "operator_cost_currency": "USD",
                "operator_id": Uuid::new_v4()
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], true);
    assert!(body["report"]["failed"].as_array().unwrap().is_empty());

    let iva_uri = uri.replace("/financials", "/iva");
    let (status, body) = h.call(Method::GET, &iva_uri, "seller", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sale"].is_object());
    assert!(body["purchase"].is_object());

    let (status, body) = h.call(Method::DELETE, &uri, "seller", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movements_deleted"], 0);
}

#[tokio::test]
async fn test_onboarding_requires_admin() {
    let h = Harness::new(false);
    let uri = format!("/api/v1/agencies/{}/fiscal/onboarding", h.agency_id);
    let request = json!({
        "cuit": 20_123_456_789_i64,
        "pto_vta": 3,
        "username": "20123456789",
        "password": "secret",
        "alias": "tesoro"
    });

    let (status, body) = h.call(Method::GET, &uri, "seller", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    let (status, _) = h
        .call(Method::POST, &uri, "seller", Some(request))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_webhook_bad_signature_in_production() {
    let h = Harness::new(true);
    let request = Request::post("/api/v1/webhooks/mercadopago")
        .header("x-signature", "ts=1704908010,v1=deadbeef")
        .header("x-request-id", "req-1")
        .body(Body::from(r#"{"type":"payment","data":{"id":"77"}}"#))
        .unwrap();

    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_payment_webhook_acknowledges_internal_failures() {
    let h = Harness::new(true);
    let v1 = compute_signature(WEBHOOK_SECRET, &manifest("77", "req-1", "1704908010"));
    let request = Request::post("/api/v1/webhooks/mercadopago?data.id=77&type=payment")
        .header("x-signature", format!("ts=1704908010,v1={v1}"))
        .header("x-request-id", "req-1")
        .body(Body::from("not json"))
        .unwrap();

    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
    assert_eq!(h.failures.entries().len(), 1);
}

#[tokio::test]
async fn test_card_webhook_handshakes() {
    let h = Harness::new(true);

    let (status, body) = h
        .send(Request::get("/api/v1/webhooks/trello").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (status, _) = h
        .send(Request::post("/api/v1/webhooks/trello").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
}
