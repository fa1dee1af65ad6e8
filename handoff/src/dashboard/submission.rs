use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{HandoffError, Result};
use crate::services::LifecycleService;

/// The backend's resolve action.
#[async_trait]
pub trait ResolveAction: Send + Sync {
    async fn resolve(&self, request_id: &str, answer: &str) -> Result<()>;
}

#[derive(Serialize)]
struct ResolveBody<'a> {
    answer: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Calls `PUT /api/v1/help-requests/{id}/resolve` once per submission.
#[derive(Clone)]
pub struct HttpResolveClient {
    client: Client,
    base_url: String,
}

impl HttpResolveClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn failure_message(status: StatusCode, body: &str) -> String {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error)
            .map(|error| error.message)
            .unwrap_or_else(|| format!("backend returned {status}"))
    }
}

#[async_trait]
impl ResolveAction for HttpResolveClient {
    async fn resolve(&self, request_id: &str, answer: &str) -> Result<()> {
        let url = format!(
            "{}/api/v1/help-requests/{}/resolve",
            self.base_url, request_id
        );

        let response = self
            .client
            .put(&url)
            .json(&ResolveBody { answer })
            .send()
            .await
            .map_err(|e| HandoffError::Submission(format!("could not reach backend: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(HandoffError::Submission(Self::failure_message(
            status, &body,
        )))
    }
}

/// In-process submissions, for dashboards running next to the backend.
#[async_trait]
impl ResolveAction for LifecycleService {
    async fn resolve(&self, request_id: &str, answer: &str) -> Result<()> {
        LifecycleService::resolve(self, request_id, answer)
            .await
            .map(|_| ())
    }
}

/// Answer form for one pending request. At most one submission is in flight
/// at a time; nothing is retried.
pub struct ResolveForm {
    action: Arc<dyn ResolveAction>,
    request_id: String,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ResolveForm {
    pub fn new(action: Arc<dyn ResolveAction>, request_id: impl Into<String>) -> Self {
        Self {
            action,
            request_id: request_id.into(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Blank answers are rejected before any I/O. Success only means the
    /// backend accepted the answer; the pending view updates when the next
    /// snapshot arrives.
    pub async fn submit(&self, answer: &str) -> Result<()> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(HandoffError::Validation(
                "Answer must not be empty".to_string(),
            ));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HandoffError::SubmissionInFlight(self.request_id.clone()));
        }
        let _in_flight = InFlight(&self.in_flight);

        match self.action.resolve(&self.request_id, answer).await {
            Ok(()) => {
                tracing::info!(request_id = %self.request_id, "Answer submitted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(request_id = %self.request_id, error = %e, "Answer submission failed");
                Err(e)
            }
        }
    }
}
