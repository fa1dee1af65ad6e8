use crate::db::connection::Database;
use crate::db::repository::{HelpRequestRepository, KnowledgeRepository};
use crate::db::traits::{DatabaseBackend, HelpRequestStore, KnowledgeStore, ResolveOutcome};
use crate::error::Result;
use crate::models::{HelpRequest, KnowledgeBaseEntry, RequestStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HelpRequestStore for LibSqlBackend {
    async fn create_help_request(&self, request: &HelpRequest) -> Result<()> {
        let conn = self.db.connect().await?;
        HelpRequestRepository::create(&conn, request).await
    }
    async fn get_help_request(&self, id: &str) -> Result<Option<HelpRequest>> {
        let conn = self.db.connect().await?;
        HelpRequestRepository::get_by_id(&conn, id).await
    }
    async fn list_help_requests(&self, statuses: &[RequestStatus]) -> Result<Vec<HelpRequest>> {
        let conn = self.db.connect().await?;
        HelpRequestRepository::list(&conn, statuses).await
    }
    async fn resolve_help_request(
        &self,
        id: &str,
        answer: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<ResolveOutcome> {
        let conn = self.db.connect().await?;
        HelpRequestRepository::resolve(&conn, id, answer, now, cutoff).await
    }
    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self.db.connect().await?;
        HelpRequestRepository::expire_pending_before(&conn, cutoff).await
    }
}

#[async_trait]
impl KnowledgeStore for LibSqlBackend {
    async fn list_knowledge_entries(&self) -> Result<Vec<KnowledgeBaseEntry>> {
        let conn = self.db.connect().await?;
        KnowledgeRepository::list(&conn).await
    }
}

#[async_trait]
impl DatabaseBackend for LibSqlBackend {
    async fn sync(&self) -> Result<()> {
        self.db.sync().await
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }
}
