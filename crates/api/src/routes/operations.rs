//! Operation financial routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tesoro_core::operation::OperationFinancials;
use tesoro_shared::types::{Currency, OperationId, OperatorId};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::{AppState, middleware::AuthUser};

/// Creates the operation routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/agencies/{agency_id}/operations/{operation_id}/financials",
            put(sync_financials).delete(delete_financials),
        )
        .route(
            "/agencies/{agency_id}/operations/{operation_id}/iva",
            get(get_iva_positions),
        )
}

/// Request body with the money-relevant fields of an operation.
#[derive(Debug, Deserialize)]
pub struct SyncFinancialsRequest {
    /// Gross sale amount.
    pub sale_amount: Decimal,
    /// Sale currency.
    pub sale_currency: Currency,
    /// Operator cost.
    pub operator_cost: Decimal,
    /// Operator cost currency.
    pub operator_cost_currency: Currency,
    /// Operator to be paid.
    pub operator_id: Option<OperatorId>,
    /// Rate agreed for the operation (ARS per USD).
    pub exchange_rate: Option<Decimal>,
    /// Due date of the operator payable.
    pub payment_due_date: Option<NaiveDate>,
}

/// PUT `/agencies/{agency_id}/operations/{operation_id}/financials` - Save amounts and sync IVA and payables.
///
/// Side-effect failures do not fail the request; the report lists them.
async fn sync_financials(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, operation_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SyncFinancialsRequest>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;

    let report = state
        .operations
        .sync_operation_financials(OperationFinancials {
            agency_id,
            operation_id: OperationId::from_uuid(operation_id),
            sale_amount: request.sale_amount,
            sale_currency: request.sale_currency,
            operator_cost: request.operator_cost,
            operator_cost_currency: request.operator_cost_currency,
            operator_id: request.operator_id,
            exchange_rate: request.exchange_rate,
            payment_due_date: request.payment_due_date,
        })
        .await?;

    if !report.is_complete() {
        warn!(%agency_id, %operation_id, failed = report.failed.len(), "operation saved with failed side effects");
    }
    Ok((
        StatusCode::OK,
        Json(json!({
            "complete": report.is_complete(),
            "report": report,
        })),
    ))
}

/// DELETE `/agencies/{agency_id}/operations/{operation_id}/financials` - Remove movements, IVA and pending payables.
async fn delete_financials(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, operation_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;

    let deletion = state
        .operations
        .delete_operation_financials(agency_id, OperationId::from_uuid(operation_id))
        .await?;
    Ok((StatusCode::OK, Json(json!(deletion))))
}

/// GET `/agencies/{agency_id}/operations/{operation_id}/iva` - Sale and purchase IVA of an operation.
async fn get_iva_positions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, operation_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;

    let (sale, purchase) = state
        .iva
        .positions(agency_id, OperationId::from_uuid(operation_id))
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "sale": sale, "purchase": purchase })),
    ))
}
