//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth::auth_middleware};

pub mod exchange_rates;
pub mod health;
pub mod invoices;
pub mod ledger;
pub mod onboarding;
pub mod operations;
pub mod webhooks;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Agency-scoped routes behind JWT authentication
    let protected_routes = Router::new()
        .merge(exchange_rates::routes())
        .merge(ledger::routes())
        .merge(operations::routes())
        .merge(invoices::routes())
        .merge(onboarding::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Webhooks authenticate with their own signatures
    Router::new()
        .merge(health::routes())
        .merge(webhooks::routes())
        .merge(protected_routes)
}
