//! Exchange rate routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tesoro_core::currency::{RateSource, ResolvedRate};
use tesoro_shared::AppError;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, middleware::AuthUser};

/// Creates the exchange rate routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/exchange-rates",
        get(get_exchange_rate).put(upsert_exchange_rate),
    )
}

/// Query parameters for resolving a rate.
#[derive(Debug, Deserialize)]
pub struct GetExchangeRateQuery {
    /// Date to resolve (defaults to today).
    pub date: Option<NaiveDate>,
    /// Refuse the fallback constant.
    #[serde(default)]
    pub strict: bool,
}

/// Request body for storing a rate.
#[derive(Debug, Deserialize)]
pub struct UpsertExchangeRateRequest {
    /// Date the rate applies from.
    pub effective_date: NaiveDate,
    /// ARS per USD.
    pub rate: Decimal,
}

/// Response for a rate lookup.
#[derive(Debug, Serialize)]
pub struct ExchangeRateResponse {
    /// Requested date.
    pub date: NaiveDate,
    /// ARS per USD.
    pub rate: Decimal,
    /// Date of the stored rate used, absent for the fallback.
    pub effective_date: Option<NaiveDate>,
    /// How the rate was found.
    pub source: RateSource,
    /// True when only the fallback constant was available.
    pub degraded: bool,
}

impl ExchangeRateResponse {
    fn new(date: NaiveDate, resolved: &ResolvedRate) -> Self {
        Self {
            date,
            rate: resolved.rate,
            effective_date: resolved.effective_date,
            source: resolved.source,
            degraded: resolved.is_degraded(),
        }
    }
}

/// GET `/exchange-rates` - Resolve the USD/ARS rate for a date.
async fn get_exchange_rate(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<GetExchangeRateQuery>,
) -> ApiResult<impl IntoResponse> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let resolved = if query.strict {
        state.rates.resolve_strict(date).await?
    } else {
        state.rates.resolve(date).await?
    };
    Ok((
        StatusCode::OK,
        Json(json!(ExchangeRateResponse::new(date, &resolved))),
    ))
}

/// PUT `/exchange-rates` - Store the rate of a date, replacing any previous one.
async fn upsert_exchange_rate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpsertExchangeRateRequest>,
) -> ApiResult<impl IntoResponse> {
    if !auth.claims().is_admin() {
        return Err(ApiError(AppError::Forbidden(
            "only administrators can change exchange rates".into(),
        )));
    }

    let stored = state
        .rates
        .upsert_rate(request.effective_date, request.rate)
        .await?;
    info!(
        user_id = %auth.user_id(),
        effective_date = %stored.effective_date,
        rate = %stored.rate,
        "exchange rate stored"
    );
    Ok((StatusCode::OK, Json(json!(stored))))
}
