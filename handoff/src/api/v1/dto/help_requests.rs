//! Help request DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::knowledge::KnowledgeEntryResponse;
use crate::error::{HandoffError, Result};
use crate::models::{self, ChatMessage, HelpRequest, RequestStatus};

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// One conversation turn as sent by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ConversationMessageDto {
    /// `user` or `assistant`; other roles are stored but never displayed.
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Request body for `POST /v1/help-requests`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHelpRequestRequest {
    /// The caller question the agent could not answer.
    pub original_query: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessageDto>,
    #[serde(alias = "livekitRoomId")]
    pub room_id: Option<String>,
    #[serde(alias = "livekitParticipantId")]
    pub participant_id: Option<String>,
}

impl From<CreateHelpRequestRequest> for models::NewHelpRequest {
    fn from(req: CreateHelpRequestRequest) -> Self {
        Self {
            original_query: req.original_query,
            conversation_history: req
                .conversation_history
                .into_iter()
                .map(|msg| ChatMessage::new(msg.role, msg.content))
                .collect(),
            room_id: req.room_id,
            participant_id: req.participant_id,
        }
    }
}

/// Request body for `PUT /v1/help-requests/{requestId}/resolve`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ResolveHelpRequestRequest {
    /// Supervisor answer; surrounding whitespace is trimmed.
    pub answer: String,
}

/// Query parameters for `GET /v1/help-requests` and its `:watch` stream.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListHelpRequestsQuery {
    /// Comma separated statuses, e.g. `resolved,unresolved`. Omit for all.
    pub status: Option<String>,
}

impl ListHelpRequestsQuery {
    /// Parsed status filter; empty means every status.
    pub fn statuses(&self) -> Result<Vec<RequestStatus>> {
        let Some(raw) = self.status.as_deref() else {
            return Ok(Vec::new());
        };

        let mut statuses = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let status = part.parse::<RequestStatus>().map_err(HandoffError::Validation)?;
            if !statuses.contains(&status) {
                statuses.push(status);
            }
        }
        Ok(statuses)
    }
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHelpRequestResponse {
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequestResponse {
    pub id: String,
    pub original_query: String,
    #[schema(value_type = String, example = "pending")]
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub conversation_history: Vec<ConversationMessageDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
}

impl From<HelpRequest> for HelpRequestResponse {
    fn from(req: HelpRequest) -> Self {
        Self {
            id: req.id,
            original_query: req.original_query,
            status: req.status,
            created_at: req.created_at,
            conversation_history: req
                .conversation_history
                .into_iter()
                .map(|msg| ConversationMessageDto {
                    role: msg.role.to_string(),
                    content: msg.content,
                })
                .collect(),
            supervisor_response: req.supervisor_response,
            resolved_at: req.resolved_at,
            room_id: req.room_id,
            participant_id: req.participant_id,
        }
    }
}

/// Requests matching a status filter, newest first.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequestSnapshot {
    pub items: Vec<HelpRequestResponse>,
    /// Change counter of the backend when the snapshot was taken.
    pub version: u64,
}

/// Response for a successful resolve.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveHelpRequestResponse {
    pub request: HelpRequestResponse,
    pub knowledge_entry: KnowledgeEntryResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_parses_and_dedupes() {
        let query = ListHelpRequestsQuery {
            status: Some("resolved, unresolved,resolved,".to_string()),
        };
        assert_eq!(
            query.statuses().unwrap(),
            vec![RequestStatus::Resolved, RequestStatus::Unresolved]
        );
        assert!(ListHelpRequestsQuery::default().statuses().unwrap().is_empty());
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let query = ListHelpRequestsQuery {
            status: Some("archived".to_string()),
        };
        assert!(matches!(
            query.statuses(),
            Err(HandoffError::Validation(_))
        ));
    }

    #[test]
    fn agent_room_fields_are_accepted() {
        let body = serde_json::json!({
            "originalQuery": "Do you take walk-ins?",
            "livekitRoomId": "RM_abc",
            "livekitParticipantId": "PA_xyz"
        });

        let req: CreateHelpRequestRequest = serde_json::from_value(body).unwrap();
        let new_request = models::NewHelpRequest::from(req);

        assert_eq!(new_request.room_id.as_deref(), Some("RM_abc"));
        assert_eq!(new_request.participant_id.as_deref(), Some("PA_xyz"));
    }

    #[test]
    fn response_round_trips_into_the_domain_model() {
        let mut req = HelpRequest::new("R1".to_string(), "How do I log in?".to_string());
        req.conversation_history = vec![ChatMessage::new("user", "How do I log in?")];

        let json = serde_json::to_value(HelpRequestResponse::from(req.clone())).unwrap();
        assert_eq!(json["originalQuery"], "How do I log in?");
        assert_eq!(json["status"], "pending");
        assert!(json.get("supervisorResponse").is_none());

        let back: HelpRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }
}
