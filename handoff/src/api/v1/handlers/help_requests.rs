//! v1 Help request handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::Query;

use super::watch::snapshot_events;
use crate::api::v1::dto::{
    CreateHelpRequestRequest, CreateHelpRequestResponse, HelpRequestResponse,
    HelpRequestSnapshot, KnowledgeEntryResponse, ListHelpRequestsQuery,
    ResolveHelpRequestRequest, ResolveHelpRequestResponse,
};
use crate::api::v1::response::{ApiError, ApiResponse, ResponseMeta};
use crate::api::{AppJson, AppState};
use crate::live::{LiveQuery, LiveQueryChannel, QuerySource};
use crate::models::HelpRequest;

fn snapshot(items: Vec<HelpRequest>, version: u64) -> HelpRequestSnapshot {
    HelpRequestSnapshot {
        items: items.into_iter().map(HelpRequestResponse::from).collect(),
        version,
    }
}

/// `POST /api/v1/help-requests`
#[utoipa::path(
    post,
    path = "/api/v1/help-requests",
    tag = "help-requests",
    operation_id = "helpRequests.create",
    request_body = CreateHelpRequestRequest,
    responses(
        (status = 201, description = "Help request escalated", body = CreateHelpRequestResponse),
        (status = 400, description = "Invalid request", body = ApiError),
    )
)]
pub async fn create_help_request(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateHelpRequestRequest>,
) -> ApiResponse<CreateHelpRequestResponse> {
    match state.lifecycle.create(req.into()).await {
        Ok(created) => ApiResponse::created(CreateHelpRequestResponse {
            request_id: created.id,
        }),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/help-requests`
#[utoipa::path(
    get,
    path = "/api/v1/help-requests",
    tag = "help-requests",
    operation_id = "helpRequests.list",
    params(ListHelpRequestsQuery),
    responses(
        (status = 200, description = "Current snapshot, newest first", body = HelpRequestSnapshot),
        (status = 400, description = "Unknown status", body = ApiError),
    )
)]
pub async fn list_help_requests(
    State(state): State<AppState>,
    Query(query): Query<ListHelpRequestsQuery>,
) -> ApiResponse<HelpRequestSnapshot> {
    let statuses = match query.statuses() {
        Ok(statuses) => statuses,
        Err(e) => return e.into(),
    };

    let version = state.hub.version();
    match state.lifecycle.list(&statuses).await {
        Ok(items) => {
            let total = items.len() as u64;
            ApiResponse::success_with_meta(
                snapshot(items, version),
                ResponseMeta { total: Some(total) },
            )
        }
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/help-requests:watch`
///
/// Server-sent events: one `snapshot` event on connect and another after
/// every change to the matching requests.
#[utoipa::path(
    get,
    path = "/api/v1/help-requests:watch",
    tag = "help-requests",
    operation_id = "helpRequests.watch",
    params(ListHelpRequestsQuery),
    responses(
        (status = 200, description = "Stream of snapshots", content_type = "text/event-stream", body = HelpRequestSnapshot),
        (status = 400, description = "Unknown status", body = ApiError),
    )
)]
pub async fn watch_help_requests(
    State(state): State<AppState>,
    Query(query): Query<ListHelpRequestsQuery>,
) -> Response {
    let statuses = match query.statuses() {
        Ok(statuses) => statuses,
        Err(e) => return ApiResponse::<()>::from(e).into_response(),
    };

    let source: Arc<dyn QuerySource<HelpRequest>> = state.live_source();
    let subscription = LiveQueryChannel::subscribe(
        source,
        LiveQuery::help_requests_with_status(&statuses),
    );
    tracing::debug!(?statuses, "Help request watch opened");

    snapshot_events(subscription, snapshot).into_response()
}

/// `GET /api/v1/help-requests/{requestId}`
#[utoipa::path(
    get,
    path = "/api/v1/help-requests/{requestId}",
    tag = "help-requests",
    operation_id = "helpRequests.get",
    params(("requestId" = String, Path, description = "Help request ID")),
    responses(
        (status = 200, description = "Help request found", body = HelpRequestResponse),
        (status = 404, description = "Help request not found", body = ApiError),
    )
)]
pub async fn get_help_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse<HelpRequestResponse> {
    match state.lifecycle.get(&id).await {
        Ok(req) => ApiResponse::success(HelpRequestResponse::from(req)),
        Err(e) => e.into(),
    }
}

/// `PUT /api/v1/help-requests/{requestId}/resolve`
#[utoipa::path(
    put,
    path = "/api/v1/help-requests/{requestId}/resolve",
    tag = "help-requests",
    operation_id = "helpRequests.resolve",
    params(("requestId" = String, Path, description = "Help request ID")),
    request_body = ResolveHelpRequestRequest,
    responses(
        (status = 200, description = "Answer recorded and learned", body = ResolveHelpRequestResponse),
        (status = 400, description = "Blank answer", body = ApiError),
        (status = 404, description = "Help request not found", body = ApiError),
        (status = 409, description = "Request already terminal or timed out", body = ApiError),
    )
)]
pub async fn resolve_help_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<ResolveHelpRequestRequest>,
) -> ApiResponse<ResolveHelpRequestResponse> {
    match state.lifecycle.resolve(&id, &req.answer).await {
        Ok((request, entry)) => ApiResponse::success(ResolveHelpRequestResponse {
            request: request.into(),
            knowledge_entry: KnowledgeEntryResponse::from(entry),
        }),
        Err(e) => e.into(),
    }
}
