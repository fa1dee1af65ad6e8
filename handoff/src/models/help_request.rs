use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::lenient_timestamp;
use super::{ChatMessage, RequestStatus};

/// A query the agent could not answer, escalated to a human supervisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequest {
    pub id: String,
    pub original_query: String,
    pub status: RequestStatus,
    /// `None` only when a record arrives with a missing or malformed stamp.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_response: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
}

impl HelpRequest {
    pub fn new(id: String, original_query: String) -> Self {
        Self {
            id,
            original_query,
            status: RequestStatus::Pending,
            created_at: Some(Utc::now()),
            conversation_history: Vec::new(),
            supervisor_response: None,
            resolved_at: None,
            room_id: None,
            participant_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Conversation turns worth rendering, in their original order.
    pub fn displayable_history(&self) -> impl Iterator<Item = &ChatMessage> {
        self.conversation_history
            .iter()
            .filter(|msg| msg.is_displayable())
    }

    /// Timestamp shown for a terminal record: when it was resolved, falling
    /// back to creation time.
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at.or(self.created_at)
    }

    /// Whether the answer fields agree with the status: both present iff
    /// resolved, with a non-blank answer and `resolved_at >= created_at`.
    pub fn answer_fields_consistent(&self) -> bool {
        match self.status {
            RequestStatus::Resolved => {
                let answered = self
                    .supervisor_response
                    .as_deref()
                    .is_some_and(|a| !a.trim().is_empty());
                let ordered = match (self.resolved_at, self.created_at) {
                    (Some(resolved), Some(created)) => resolved >= created,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                answered && ordered
            }
            RequestStatus::Pending | RequestStatus::Unresolved => {
                self.supervisor_response.is_none() && self.resolved_at.is_none()
            }
        }
    }
}

/// Input for escalating a new help request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewHelpRequest {
    #[validate(length(min = 1, max = 10_000))]
    pub original_query: String,
    #[validate(length(max = 500))]
    pub conversation_history: Vec<ChatMessage>,
    pub room_id: Option<String>,
    pub participant_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn resolved(created_at: DateTime<Utc>, resolved_at: DateTime<Utc>) -> HelpRequest {
        HelpRequest {
            status: RequestStatus::Resolved,
            created_at: Some(created_at),
            supervisor_response: Some("Use endpoint /v2/login".to_string()),
            resolved_at: Some(resolved_at),
            ..HelpRequest::new("r1".to_string(), "How do I log in?".to_string())
        }
    }

    #[test]
    fn test_new_request_is_pending_without_answer() {
        let req = HelpRequest::new("r1".to_string(), "q".to_string());
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(!req.is_terminal());
        assert!(req.answer_fields_consistent());
    }

    #[test]
    fn test_resolved_requires_answer_and_ordering() {
        let now = Utc::now();
        assert!(resolved(now, now + Duration::seconds(3)).answer_fields_consistent());
        assert!(!resolved(now, now - Duration::seconds(3)).answer_fields_consistent());

        let mut blank = resolved(now, now);
        blank.supervisor_response = Some("  ".to_string());
        assert!(!blank.answer_fields_consistent());

        let mut missing_time = resolved(now, now);
        missing_time.resolved_at = None;
        assert!(!missing_time.answer_fields_consistent());
    }

    #[test]
    fn test_unresolved_with_answer_is_inconsistent() {
        let mut req = resolved(Utc::now(), Utc::now());
        req.status = RequestStatus::Unresolved;
        assert!(!req.answer_fields_consistent());
    }

    #[test]
    fn test_settled_at_falls_back_to_created_at() {
        let mut req = HelpRequest::new("r1".to_string(), "q".to_string());
        req.status = RequestStatus::Unresolved;
        assert_eq!(req.settled_at(), req.created_at);
    }

    #[test]
    fn test_displayable_history_filters_noise() {
        let mut req = HelpRequest::new("r1".to_string(), "q".to_string());
        req.conversation_history = vec![
            ChatMessage::new("system", "You are a receptionist"),
            ChatMessage::new("user", "Do you do balayage?"),
            ChatMessage::new("assistant", ""),
            ChatMessage::new("assistant", "Let me check with my supervisor."),
        ];
        let shown: Vec<&str> = req
            .displayable_history()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            shown,
            vec!["Do you do balayage?", "Let me check with my supervisor."]
        );
    }

    #[test]
    fn test_deserializes_malformed_created_at_as_unknown() {
        let json = r#"{
            "id": "r9",
            "originalQuery": "Are you open Monday?",
            "status": "pending",
            "createdAt": "not-a-date",
            "conversationHistory": []
        }"#;
        let req: HelpRequest = serde_json::from_str(json).unwrap();
        assert!(req.created_at.is_none());
        assert_eq!(req.status, RequestStatus::Pending);
    }

    #[test]
    fn test_new_help_request_validation() {
        let input = NewHelpRequest {
            original_query: String::new(),
            conversation_history: Vec::new(),
            room_id: None,
            participant_id: None,
        };
        assert!(input.validate().is_err());
    }
}
