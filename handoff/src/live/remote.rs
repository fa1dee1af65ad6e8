use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::channel::Snapshot;
use super::query::{sort_records, LiveQuery, LiveRecord, QueryPlan};
use super::source::{collection_mismatch, ChangeFeed, QuerySource};
use crate::error::{HandoffError, Result};
use crate::models::{HelpRequest, KnowledgeBaseEntry};

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<EnvelopeError>,
}

#[derive(Deserialize)]
struct EnvelopeError {
    message: String,
}

#[derive(Deserialize)]
struct SnapshotBody<T> {
    items: Vec<T>,
    #[serde(default)]
    version: u64,
}

/// Reads channels from a running backend over its v1 API, polling on a fixed
/// interval.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    poll_interval: Duration,
}

impl HttpSource {
    pub fn new(base_url: &str, poll_interval: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, poll_interval))
    }

    pub fn with_client(client: Client, base_url: &str, poll_interval: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval,
        }
    }

    async fn get_snapshot<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Snapshot<T>> {
        let url = format!("{}/api/v1/{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<Envelope<serde_json::Value>>()
                .await
                .ok()
                .and_then(|body| body.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("backend returned {status}"));
            return Err(HandoffError::Subscription(message));
        }

        let envelope: Envelope<SnapshotBody<T>> = response.json().await?;
        envelope
            .data
            .map(|body| Snapshot {
                version: body.version,
                items: body.items,
            })
            .ok_or_else(|| HandoffError::Subscription("backend sent no data".to_string()))
    }
}

#[async_trait]
impl QuerySource<HelpRequest> for HttpSource {
    async fn fetch(&self, query: &LiveQuery) -> Result<Snapshot<HelpRequest>> {
        let QueryPlan::HelpRequests {
            statuses,
            direction,
        } = query.plan()?
        else {
            return Err(collection_mismatch::<HelpRequest>(query));
        };

        let params = match statuses {
            Some(statuses) if statuses.is_empty() => {
                return Ok(Snapshot {
                    version: 0,
                    items: Vec::new(),
                })
            }
            Some(statuses) => {
                let joined = statuses
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                vec![("status", joined)]
            }
            None => Vec::new(),
        };

        let mut snapshot: Snapshot<HelpRequest> =
            self.get_snapshot("help-requests", &params).await?;
        sort_records(&mut snapshot.items, direction);
        Ok(snapshot)
    }

    fn changes(&self) -> ChangeFeed {
        ChangeFeed::Poll(self.poll_interval)
    }
}

#[async_trait]
impl QuerySource<KnowledgeBaseEntry> for HttpSource {
    async fn fetch(&self, query: &LiveQuery) -> Result<Snapshot<KnowledgeBaseEntry>> {
        let QueryPlan::KnowledgeBase { direction } = query.plan()? else {
            return Err(collection_mismatch::<KnowledgeBaseEntry>(query));
        };

        let mut snapshot: Snapshot<KnowledgeBaseEntry> =
            self.get_snapshot("knowledge-base", &[]).await?;
        sort_records(&mut snapshot.items, direction);
        Ok(snapshot)
    }

    fn changes(&self) -> ChangeFeed {
        ChangeFeed::Poll(self.poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HttpSource {
        HttpSource::new(
            &server.uri(),
            Duration::from_millis(50),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_pending_passes_status_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/help-requests"))
            .and(query_param("status", "pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "items": [
                        {
                            "id": "r1",
                            "originalQuery": "Do you take walk-ins?",
                            "status": "pending",
                            "createdAt": "2026-10-16T09:00:00Z",
                            "conversationHistory": [{"role": "user", "content": "walk-ins?"}]
                        },
                        {
                            "id": "r2",
                            "originalQuery": "Parking?",
                            "status": "pending",
                            "createdAt": "garbage"
                        }
                    ],
                    "version": 4
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot: Snapshot<HelpRequest> =
            source(&server).fetch(&LiveQuery::pending()).await.unwrap();

        assert_eq!(snapshot.version, 4);
        let items = snapshot.items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "r1");
        assert_eq!(items[0].status, RequestStatus::Pending);
        assert!(items[1].created_at.is_none());
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_subscription_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/knowledge-base"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"code": "internal_error", "message": "An internal error occurred"}
            })))
            .mount(&server)
            .await;

        let result: Result<Snapshot<KnowledgeBaseEntry>> =
            source(&server).fetch(&LiveQuery::knowledge_base()).await;

        match result {
            Err(HandoffError::Subscription(msg)) => {
                assert_eq!(msg, "An internal error occurred")
            }
            other => panic!("expected subscription error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mismatched_collection_never_hits_network() {
        let server = MockServer::start().await;
        let result: Result<Snapshot<KnowledgeBaseEntry>> =
            source(&server).fetch(&LiveQuery::pending()).await;
        assert!(matches!(result, Err(HandoffError::Subscription(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
