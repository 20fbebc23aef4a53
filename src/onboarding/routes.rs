//! REST endpoints for onboarding status and the aggregated record.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::manager::{AdvanceOutcome, OnboardingManager};
use super::state::OnboardingStep;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub from: OnboardingStep,
}

/// GET /api/onboarding/status
///
/// Current step, stepper progress, and each step's live view.
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.status().await)
}

/// GET /api/onboarding/record
///
/// Payloads of every finished step. An empty object until the first step
/// completes.
async fn get_record(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.record().await)
}

/// POST /api/onboarding/advance
async fn post_advance(
    State(state): State<OnboardingRouteState>,
    Json(req): Json<AdvanceRequest>,
) -> impl IntoResponse {
    let outcome = state.manager.advance(req.from).await;
    let status = match outcome {
        AdvanceOutcome::Advanced { .. } => StatusCode::OK,
        AdvanceOutcome::Ignored { .. } => StatusCode::CONFLICT,
        AdvanceOutcome::NotReady { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(outcome))
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/record", get(get_record))
        .route("/api/onboarding/advance", post(post_advance))
        .with_state(state)
}
