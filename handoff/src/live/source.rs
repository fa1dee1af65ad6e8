use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::channel::Snapshot;
use super::hub::{ChangeEvent, ChangeHub};
use super::query::{sort_records, LiveQuery, LiveRecord, QueryPlan};
use crate::db::DatabaseBackend;
use crate::error::{HandoffError, Result};
use crate::models::{HelpRequest, KnowledgeBaseEntry};

/// How a source tells a channel that its result set may have changed.
pub enum ChangeFeed {
    /// Re-run the query on every event for the channel's collection.
    Push(broadcast::Receiver<ChangeEvent>),
    /// No change notifications; re-run the query on a fixed interval.
    Poll(Duration),
}

/// Something a live query can be evaluated against.
#[async_trait]
pub trait QuerySource<T: LiveRecord>: Send + Sync {
    /// Full current result set of `query`, already ordered, tagged with the
    /// hub version observed before the read.
    async fn fetch(&self, query: &LiveQuery) -> Result<Snapshot<T>>;

    fn changes(&self) -> ChangeFeed;
}

pub(crate) fn collection_mismatch<T: LiveRecord>(query: &LiveQuery) -> HandoffError {
    HandoffError::Subscription(format!(
        "query targets {} but the channel carries {}",
        query.collection,
        T::COLLECTION
    ))
}

/// Evaluates queries directly against the store and listens to the
/// in-process change hub.
#[derive(Clone)]
pub struct LocalSource {
    db: Arc<dyn DatabaseBackend>,
    hub: ChangeHub,
}

impl LocalSource {
    pub fn new(db: Arc<dyn DatabaseBackend>, hub: ChangeHub) -> Self {
        Self { db, hub }
    }
}

#[async_trait]
impl QuerySource<HelpRequest> for LocalSource {
    async fn fetch(&self, query: &LiveQuery) -> Result<Snapshot<HelpRequest>> {
        let QueryPlan::HelpRequests {
            statuses,
            direction,
        } = query.plan()?
        else {
            return Err(collection_mismatch::<HelpRequest>(query));
        };

        let version = self.hub.version();
        let mut items = match statuses {
            Some(statuses) if statuses.is_empty() => Vec::new(),
            Some(statuses) => self.db.list_help_requests(&statuses).await?,
            None => self.db.list_help_requests(&[]).await?,
        };
        sort_records(&mut items, direction);
        Ok(Snapshot { version, items })
    }

    fn changes(&self) -> ChangeFeed {
        ChangeFeed::Push(self.hub.subscribe())
    }
}

#[async_trait]
impl QuerySource<KnowledgeBaseEntry> for LocalSource {
    async fn fetch(&self, query: &LiveQuery) -> Result<Snapshot<KnowledgeBaseEntry>> {
        let QueryPlan::KnowledgeBase { direction } = query.plan()? else {
            return Err(collection_mismatch::<KnowledgeBaseEntry>(query));
        };

        let version = self.hub.version();
        let mut items = self.db.list_knowledge_entries().await?;
        sort_records(&mut items, direction);
        Ok(Snapshot { version, items })
    }

    fn changes(&self) -> ChangeFeed {
        ChangeFeed::Push(self.hub.subscribe())
    }
}
