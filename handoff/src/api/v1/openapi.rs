use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Handoff API",
        version = "1.0.0",
        description = "Human-in-the-loop escalation: agents hand questions to supervisors, answers become a knowledge base.",
    ),
    paths(
        handlers::health::health_check,
        handlers::help_requests::create_help_request,
        handlers::help_requests::list_help_requests,
        handlers::help_requests::watch_help_requests,
        handlers::help_requests::get_help_request,
        handlers::help_requests::resolve_help_request,
        handlers::knowledge::list_knowledge_base,
        handlers::knowledge::watch_knowledge_base,
        handlers::admin::run_timeouts,
    ),
    components(schemas(
        // Response envelope
        response::ErrorCode,
        response::ApiError,
        response::ResponseMeta,
        // Help requests
        dto::help_requests::ConversationMessageDto,
        dto::help_requests::CreateHelpRequestRequest,
        dto::help_requests::CreateHelpRequestResponse,
        dto::help_requests::HelpRequestResponse,
        dto::help_requests::HelpRequestSnapshot,
        dto::help_requests::ResolveHelpRequestRequest,
        dto::help_requests::ResolveHelpRequestResponse,
        // Knowledge base
        dto::knowledge::KnowledgeEntryResponse,
        dto::knowledge::KnowledgeBaseSnapshot,
        // Admin
        dto::admin::TimeoutRunResponse,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::DatabaseStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "help-requests", description = "Escalation, live listing and resolution of help requests"),
        (name = "knowledge-base", description = "Answers learned from resolved requests"),
        (name = "admin", description = "Administrative operations"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
