//! Knowledge base DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::KnowledgeBaseEntry;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntryResponse {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Help request this answer was learned from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_request_id: Option<String>,
}

impl From<KnowledgeBaseEntry> for KnowledgeEntryResponse {
    fn from(entry: KnowledgeBaseEntry) -> Self {
        Self {
            id: entry.id,
            question: entry.question,
            answer: entry.answer,
            created_at: entry.created_at,
            source_request_id: entry.source_request_id,
        }
    }
}

/// Full knowledge base, newest first.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseSnapshot {
    pub items: Vec<KnowledgeEntryResponse>,
    /// Change counter of the backend when the snapshot was taken.
    pub version: u64,
}
