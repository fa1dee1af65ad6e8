use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::common::lenient_timestamp;

/// A supervisor answer captured when a help request is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// Non-owning link back to the request that produced this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_request_id: Option<String>,
}

/// Newest first; undated entries go last; ties break on `id` ascending.
pub fn newest_first(
    a_created: Option<DateTime<Utc>>,
    a_id: &str,
    b_created: Option<DateTime<Utc>>,
    b_id: &str,
) -> Ordering {
    match (a_created, b_created) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a_id.cmp(b_id))
}

impl KnowledgeBaseEntry {
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        newest_first(self.created_at, &self.id, other.created_at, &other.id)
    }
}
