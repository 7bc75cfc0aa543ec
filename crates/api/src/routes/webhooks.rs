//! Webhook endpoints for the payment provider and the card board.
//!
//! Both answer `200 {"received": true}` whatever happens internally, so the
//! sender stops retrying. Only a rejected signature answers 401.

use std::collections::HashMap;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use tesoro_core::billing::PaymentWebhookRequest;
use tesoro_core::cardboard::CardWebhookRequest;
use tesoro_core::webhook::IngestOutcome;
use tracing::debug;

use crate::AppState;
use crate::error::ApiResult;

/// Payment-provider signature header.
const SIGNATURE_HEADER: &str = "x-signature";
/// Payment-provider delivery id header.
const REQUEST_ID_HEADER: &str = "x-request-id";
/// Card-board signature header.
const CARD_SIGNATURE_HEADER: &str = "x-trello-webhook";

/// Creates the webhook routes. They carry no JWT.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/webhooks/mercadopago",
            get(acknowledge).post(payment_webhook),
        )
        .route(
            "/webhooks/trello",
            get(acknowledge).post(card_webhook),
        )
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn received(outcome: &IngestOutcome) -> (StatusCode, Json<Value>) {
    debug!(outcome = ?outcome, "webhook processed");
    (StatusCode::OK, Json(json!({ "received": true })))
}

/// GET - Registration handshakes (HEAD is served by the same handler).
async fn acknowledge() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "received": true })))
}

/// POST `/webhooks/mercadopago` - Payment and preapproval notifications.
async fn payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request = PaymentWebhookRequest {
        body: body.to_vec(),
        signature: header(&headers, SIGNATURE_HEADER),
        request_id: header(&headers, REQUEST_ID_HEADER),
        query_data_id: query.get("data.id").cloned(),
    };
    let outcome = state.payment_webhooks.ingest(&request).await?;
    Ok(received(&outcome))
}

/// POST `/webhooks/trello` - Card actions.
async fn card_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request = CardWebhookRequest {
        body: body.to_vec(),
        signature: header(&headers, CARD_SIGNATURE_HEADER),
    };
    let outcome = state.card_webhooks.ingest(&request).await?;
    Ok(received(&outcome))
}
