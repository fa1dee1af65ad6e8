use std::sync::Arc;

use chrono::Duration;
use nanoid::nanoid;
use validator::Validate;

use crate::clock::Clock;
use crate::config::LifecycleConfig;
use crate::db::{DatabaseBackend, ResolveOutcome};
use crate::error::{HandoffError, Result};
use crate::live::{ChangeHub, Collection};
use crate::models::{HelpRequest, KnowledgeBaseEntry, NewHelpRequest, RequestStatus};

/// Owns every write to help requests: creation, resolution and expiry.
///
/// Transitions are compare-and-set in the store, so concurrent resolvers and
/// the timeout sweeper can race freely; exactly one of them wins.
#[derive(Clone)]
pub struct LifecycleService {
    db: Arc<dyn DatabaseBackend>,
    hub: ChangeHub,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl LifecycleService {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        hub: ChangeHub,
        clock: Arc<dyn Clock>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            db,
            hub,
            clock,
            timeout: config.request_timeout(),
        }
    }

    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn create(&self, input: NewHelpRequest) -> Result<HelpRequest> {
        input
            .validate()
            .map_err(|e| HandoffError::Validation(e.to_string()))?;
        if input.original_query.trim().is_empty() {
            return Err(HandoffError::Validation(
                "originalQuery must not be blank".to_string(),
            ));
        }

        let request = HelpRequest {
            conversation_history: input.conversation_history,
            room_id: input.room_id,
            participant_id: input.participant_id,
            created_at: Some(self.clock.now()),
            ..HelpRequest::new(nanoid!(), input.original_query)
        };

        self.db.create_help_request(&request).await?;
        self.hub.notify(Collection::HelpRequests);

        tracing::info!(request_id = %request.id, room_id = ?request.room_id, "Help request created");
        Ok(request)
    }

    pub async fn get(&self, id: &str) -> Result<HelpRequest> {
        self.db
            .get_help_request(id)
            .await?
            .ok_or_else(|| HandoffError::NotFound(format!("Help request {id} not found")))
    }

    pub async fn list(&self, statuses: &[RequestStatus]) -> Result<Vec<HelpRequest>> {
        self.db.list_help_requests(statuses).await
    }

    pub async fn knowledge_base(&self) -> Result<Vec<KnowledgeBaseEntry>> {
        self.db.list_knowledge_entries().await
    }

    /// Accepts a supervisor answer while the request is pending and inside
    /// its window. A late answer expires the request and is rejected.
    pub async fn resolve(
        &self,
        id: &str,
        answer: &str,
    ) -> Result<(HelpRequest, KnowledgeBaseEntry)> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(HandoffError::Validation(
                "answer must not be empty".to_string(),
            ));
        }

        let now = self.clock.now();
        let cutoff = now - self.timeout;

        match self
            .db
            .resolve_help_request(id, answer, now, cutoff)
            .await?
        {
            ResolveOutcome::Resolved { request, entry } => {
                self.hub.notify(Collection::HelpRequests);
                self.hub.notify(Collection::KnowledgeBase);
                tracing::info!(request_id = %id, entry_id = %entry.id, "Help request resolved");
                Ok((request, entry))
            }
            ResolveOutcome::NotFound => Err(HandoffError::NotFound(format!(
                "Help request {id} not found"
            ))),
            ResolveOutcome::AlreadyTerminal(status) => {
                tracing::debug!(request_id = %id, %status, "Resolve lost the race");
                Err(HandoffError::Conflict(format!(
                    "Help request {id} is already {status}"
                )))
            }
            ResolveOutcome::Expired => {
                self.hub.notify(Collection::HelpRequests);
                tracing::info!(request_id = %id, "Late resolve expired the request");
                Err(HandoffError::Conflict(format!(
                    "Help request {id} timed out before it was resolved"
                )))
            }
        }
    }

    /// Moves every overdue pending request to `unresolved`.
    pub async fn expire_overdue(&self) -> Result<Vec<String>> {
        let cutoff = self.clock.now() - self.timeout;
        let expired = self.db.expire_pending_before(cutoff).await?;

        if !expired.is_empty() {
            self.hub.notify(Collection::HelpRequests);
            tracing::info!(count = expired.len(), ids = ?expired, "Expired overdue help requests");
        }
        Ok(expired)
    }
}
