//! v1 Admin handlers.

use axum::extract::State;

use crate::api::v1::dto::TimeoutRunResponse;
use crate::api::v1::response::{ApiError, ApiResponse};
use crate::api::AppState;

/// `POST /api/v1/admin/timeouts:run`
///
/// Runs one timeout sweep now instead of waiting for the background interval.
#[utoipa::path(
    post,
    path = "/api/v1/admin/timeouts:run",
    tag = "admin",
    responses(
        (status = 200, description = "Sweep completed", body = TimeoutRunResponse),
        (status = 500, description = "Sweep failed", body = ApiError),
    )
)]
pub async fn run_timeouts(State(state): State<AppState>) -> ApiResponse<TimeoutRunResponse> {
    match state.sweeper.run_once().await {
        Ok(expired) => ApiResponse::success(TimeoutRunResponse {
            requests_expired: expired,
            request_timeout_secs: state.config.lifecycle.request_timeout_secs,
        }),
        Err(e) => e.into(),
    }
}
