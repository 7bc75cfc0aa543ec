//! Fiscal invoice routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde_json::json;
use tesoro_shared::types::InvoiceId;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::{AppState, middleware::AuthUser};

/// Creates the invoice routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/agencies/{agency_id}/invoices/{invoice_id}/authorize",
        post(authorize_invoice),
    )
}

/// POST `/agencies/{agency_id}/invoices/{invoice_id}/authorize` - Request a CAE for an invoice.
///
/// A rejection by the authority is a successful call returning the
/// rejected invoice; timeouts and transport failures answer 502.
async fn authorize_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;

    let invoice = state
        .invoices
        .authorize(agency_id, InvoiceId::from_uuid(invoice_id))
        .await?;
    info!(
        %agency_id,
        invoice_id = %invoice.id,
        status = %invoice.status,
        user_id = %auth.user_id(),
        "invoice authorization finished"
    );
    Ok((StatusCode::OK, Json(json!(invoice))))
}
