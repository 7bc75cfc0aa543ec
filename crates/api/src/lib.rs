//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - Public webhook endpoints for the payment provider and the card board
//! - Agency-scoped JSON endpoints behind JWT authentication
//! - The mapping of domain errors to HTTP responses

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::header::AUTHORIZATION;
use tesoro_core::billing::PaymentWebhookIngestor;
use tesoro_core::cardboard::CardBoardWebhookIngestor;
use tesoro_core::currency::ExchangeRateResolver;
use tesoro_core::fiscal::InvoiceAuthorizer;
use tesoro_core::iva::IvaService;
use tesoro_core::ledger::{BalanceProjector, LedgerService};
use tesoro_core::onboarding::OnboardingService;
use tesoro_core::operation::OperationFinancialsService;
use tesoro_shared::JwtService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// USD/ARS rate resolution and maintenance.
    pub rates: Arc<ExchangeRateResolver>,
    /// Movement recording.
    pub ledger: Arc<LedgerService>,
    /// Balance projection and cash-box reconciliation.
    pub balances: Arc<BalanceProjector>,
    /// IVA positions.
    pub iva: Arc<IvaService>,
    /// Operation financial side effects.
    pub operations: Arc<OperationFinancialsService>,
    /// Invoice authorization.
    pub invoices: Arc<InvoiceAuthorizer>,
    /// Fiscal onboarding runs.
    pub onboarding: Arc<OnboardingService>,
    /// Payment-provider webhooks.
    pub payment_webhooks: Arc<PaymentWebhookIngestor>,
    /// Card-board webhooks.
    pub card_webhooks: Arc<CardBoardWebhookIngestor>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
