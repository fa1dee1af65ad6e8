//! v1 Knowledge base handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};

use super::watch::snapshot_events;
use crate::api::v1::dto::{KnowledgeBaseSnapshot, KnowledgeEntryResponse};
use crate::api::v1::response::{ApiResponse, ResponseMeta};
use crate::api::AppState;
use crate::live::{LiveQuery, LiveQueryChannel, QuerySource};
use crate::models::KnowledgeBaseEntry;

fn snapshot(items: Vec<KnowledgeBaseEntry>, version: u64) -> KnowledgeBaseSnapshot {
    KnowledgeBaseSnapshot {
        items: items.into_iter().map(KnowledgeEntryResponse::from).collect(),
        version,
    }
}

/// `GET /api/v1/knowledge-base`
#[utoipa::path(
    get,
    path = "/api/v1/knowledge-base",
    tag = "knowledge-base",
    operation_id = "knowledgeBase.list",
    responses(
        (status = 200, description = "Learned answers, newest first", body = KnowledgeBaseSnapshot),
    )
)]
pub async fn list_knowledge_base(State(state): State<AppState>) -> ApiResponse<KnowledgeBaseSnapshot> {
    let version = state.hub.version();
    match state.lifecycle.knowledge_base().await {
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

/// `GET /api/v1/knowledge-base:watch`
#[utoipa::path(
    get,
    path = "/api/v1/knowledge-base:watch",
    tag = "knowledge-base",
    operation_id = "knowledgeBase.watch",
    responses(
        (status = 200, description = "Stream of snapshots", content_type = "text/event-stream", body = KnowledgeBaseSnapshot),
    )
)]
pub async fn watch_knowledge_base(State(state): State<AppState>) -> Response {
    let source: Arc<dyn QuerySource<KnowledgeBaseEntry>> = state.live_source();
    let subscription = LiveQueryChannel::subscribe(source, LiveQuery::knowledge_base());

    snapshot_events(subscription, snapshot).into_response()
}
