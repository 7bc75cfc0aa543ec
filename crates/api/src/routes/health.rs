//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Times the fallback USD/ARS constant was used since start.
    pub rate_fallbacks: u64,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let rate_fallbacks = state.rates.fallback_count();
    Json(HealthResponse {
        status: if rate_fallbacks == 0 { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        rate_fallbacks,
    })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
