use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{HelpRequest, KnowledgeBaseEntry, RequestStatus};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// What a guarded resolve write did.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The request moved to `resolved`; the learned entry was written in the
    /// same transaction.
    Resolved {
        request: HelpRequest,
        entry: KnowledgeBaseEntry,
    },
    /// No request with that id.
    NotFound,
    /// Another transition committed first.
    AlreadyTerminal(RequestStatus),
    /// The request was still pending but its window had closed; it has now
    /// been marked `unresolved`.
    Expired,
}

// ---------------------------------------------------------------------------
// Individual store traits
// ---------------------------------------------------------------------------

/// Reads and guarded transitions for help requests.
#[async_trait]
pub trait HelpRequestStore: Send + Sync {
    async fn create_help_request(&self, request: &HelpRequest) -> Result<()>;
    async fn get_help_request(&self, id: &str) -> Result<Option<HelpRequest>>;

    /// Requests whose status is in `statuses` (all when empty), newest first,
    /// ties broken by id.
    async fn list_help_requests(&self, statuses: &[RequestStatus]) -> Result<Vec<HelpRequest>>;

    /// `pending -> resolved` if the request is pending and was created after
    /// `cutoff`. Inserts the knowledge-base entry atomically with the update.
    async fn resolve_help_request(
        &self,
        id: &str,
        answer: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<ResolveOutcome>;

    /// `pending -> unresolved` for every request created at or before
    /// `cutoff`. Returns the ids that transitioned.
    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;
}

/// Read access to learned answers. Entries are only ever written by
/// [`HelpRequestStore::resolve_help_request`].
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn list_knowledge_entries(&self) -> Result<Vec<KnowledgeBaseEntry>>;
}

// ---------------------------------------------------------------------------
// Unified backend supertrait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DatabaseBackend: HelpRequestStore + KnowledgeStore {
    /// Sync with remote (e.g. Turso replication). No-op for local-only backends.
    async fn sync(&self) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}
