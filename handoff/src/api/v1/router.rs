use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::state::AppState;

use super::handlers;

pub fn v1_router() -> Router<AppState> {
    let help_requests = Router::new()
        .route(
            "/",
            get(handlers::help_requests::list_help_requests)
                .post(handlers::help_requests::create_help_request),
        )
        .route(
            "/{requestId}",
            get(handlers::help_requests::get_help_request),
        )
        .route(
            "/{requestId}/resolve",
            put(handlers::help_requests::resolve_help_request),
        );

    let knowledge_base =
        Router::new().route("/", get(handlers::knowledge::list_knowledge_base));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .merge(super::openapi::redoc_router())
        .route(
            "/help-requests:watch",
            get(handlers::help_requests::watch_help_requests),
        )
        .route(
            "/knowledge-base:watch",
            get(handlers::knowledge::watch_knowledge_base),
        )
        .route("/admin/timeouts:run", post(handlers::admin::run_timeouts))
        .nest("/help-requests", help_requests)
        .nest("/knowledge-base", knowledge_base)
}
