//! Ledger movement and balance routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tesoro_core::ledger::{
    Balance, BalanceTarget, MovementType, PaymentMethod, RecordMovementInput,
};
use tesoro_shared::types::{
    CashBoxId, Currency, FinancialAccountId, LeadId, MovementId, OperationId, OperatorId, SellerId,
};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::{AppState, middleware::AuthUser};

/// Creates the ledger routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agencies/{agency_id}/movements", post(record_movement))
        .route(
            "/agencies/{agency_id}/movements/{movement_id}",
            delete(delete_movement),
        )
        .route(
            "/agencies/{agency_id}/accounts/{account_id}/balance",
            get(get_account_balance),
        )
        .route(
            "/agencies/{agency_id}/cash-boxes/{cash_box_id}/balance",
            get(get_cash_box_balance),
        )
        .route(
            "/agencies/{agency_id}/cash-boxes/{cash_box_id}/reconcile",
            post(reconcile_cash_box),
        )
}

/// Request body for recording a movement.
#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    /// Linked operation.
    pub operation_id: Option<OperationId>,
    /// Linked lead.
    pub lead_id: Option<LeadId>,
    /// Kind of movement.
    pub movement_type: MovementType,
    /// Free-text concept.
    pub concept: String,
    /// Currency of `amount`.
    pub currency: Currency,
    /// Positive amount.
    pub amount: Decimal,
    /// Payment method.
    pub method: PaymentMethod,
    /// Financial account.
    pub account_id: FinancialAccountId,
    /// Cash box to route the movement to.
    pub cash_box_id: Option<CashBoxId>,
    /// Linked operator.
    pub operator_id: Option<OperatorId>,
    /// Linked seller.
    pub seller_id: Option<SellerId>,
    /// Date used for the exchange rate (defaults to today).
    pub movement_date: Option<NaiveDate>,
}

/// Query parameters for balance reads.
#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    /// Only count movements created up to this instant.
    pub as_of: Option<DateTime<Utc>>,
}

/// Response for a cash-box balance.
#[derive(Debug, Serialize)]
pub struct CashBoxBalanceResponse {
    /// Balance folded from the movements.
    pub balance: Balance,
    /// Cached balance stored on the box.
    pub cached: Decimal,
    /// True when the cache differs from the fold.
    pub drift: bool,
}

/// POST `/agencies/{agency_id}/movements` - Record a ledger movement.
async fn record_movement(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(agency_id): Path<Uuid>,
    Json(request): Json<RecordMovementRequest>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;

    let movement = state
        .ledger
        .record(RecordMovementInput {
            agency_id,
            operation_id: request.operation_id,
            lead_id: request.lead_id,
            movement_type: request.movement_type,
            concept: request.concept,
            currency: request.currency,
            amount: request.amount,
            method: request.method,
            account_id: request.account_id,
            cash_box_id: request.cash_box_id,
            operator_id: request.operator_id,
            seller_id: request.seller_id,
            movement_date: request
                .movement_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            created_by: auth.user_id(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!(movement))))
}

/// DELETE `/agencies/{agency_id}/movements/{movement_id}` - Delete a movement and reverse its cash-box delta.
async fn delete_movement(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, movement_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;
    let movement_id = MovementId::from_uuid(movement_id);

    state.ledger.delete_movement(agency_id, movement_id).await?;
    info!(%agency_id, %movement_id, user_id = %auth.user_id(), "movement deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/agencies/{agency_id}/accounts/{account_id}/balance` - Project an account balance.
async fn get_account_balance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, account_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;
    let target = BalanceTarget::Account(FinancialAccountId::from_uuid(account_id));

    let balance = state
        .balances
        .project_balance(agency_id, target, query.as_of)
        .await?;
    Ok((StatusCode::OK, Json(json!(balance))))
}

/// GET `/agencies/{agency_id}/cash-boxes/{cash_box_id}/balance` - Cached and projected cash-box balance.
async fn get_cash_box_balance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, cash_box_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;
    let cash_box_id = CashBoxId::from_uuid(cash_box_id);

    let cached = state
        .balances
        .cash_box_balance_fast(agency_id, cash_box_id)
        .await?;
    let balance = state
        .balances
        .project_balance(agency_id, BalanceTarget::CashBox(cash_box_id), query.as_of)
        .await?;

    // A historical fold is not comparable with the current cache.
    let drift = query.as_of.is_none() && balance.amount != cached;
    Ok((
        StatusCode::OK,
        Json(json!(CashBoxBalanceResponse {
            balance,
            cached,
            drift,
        })),
    ))
}

/// POST `/agencies/{agency_id}/cash-boxes/{cash_box_id}/reconcile` - Rewrite the cached balance from the movements.
async fn reconcile_cash_box(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((agency_id, cash_box_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;

    let report = state
        .balances
        .reconcile_cash_box(agency_id, CashBoxId::from_uuid(cash_box_id))
        .await?;
    Ok((StatusCode::OK, Json(json!(report))))
}
