//! Fiscal onboarding routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde_json::json;
use tesoro_core::onboarding::{OnboardingRequest, OnboardingState};
use tesoro_shared::AppError;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, middleware::AuthUser};

/// Creates the onboarding routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/agencies/{agency_id}/fiscal/onboarding",
        post(start_onboarding).get(get_onboarding_status),
    )
}

/// POST `/agencies/{agency_id}/fiscal/onboarding` - Start certificate creation and web-service authorization.
///
/// Answers 202 at once; the run continues in the background.
async fn start_onboarding(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(agency_id): Path<Uuid>,
    Json(request): Json<OnboardingRequest>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;
    if !auth.claims().is_admin() {
        return Err(ApiError(AppError::Forbidden(
            "only administrators can onboard fiscal credentials".into(),
        )));
    }

    // The run outlives the request; its handle is not awaited.
    let _run = state.onboarding.start(agency_id, request).await?;
    info!(%agency_id, user_id = %auth.user_id(), "onboarding accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": OnboardingState::InProcess })),
    ))
}

/// GET `/agencies/{agency_id}/fiscal/onboarding` - Current onboarding state.
async fn get_onboarding_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(agency_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let agency_id = auth.agency(agency_id)?;

    let Some(settings) = state.onboarding.status(agency_id).await? else {
        return Ok((
            StatusCode::OK,
            Json(json!({ "status": OnboardingState::Pending })),
        ));
    };
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": settings.onboarding,
            "error": settings.onboarding_error,
            "cuit": settings.cuit,
            "pto_vta": settings.pto_vta,
            "environment": settings.environment,
            "started_at": settings.onboarding_started_at,
        })),
    ))
}
