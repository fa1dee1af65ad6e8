//! Admin DTOs for the v1 API.

use serde::Serialize;

/// Response for `POST /v1/admin/timeouts:run`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutRunResponse {
    /// Pending requests moved to `unresolved` by this sweep.
    pub requests_expired: u64,
    /// Seconds a request may stay pending.
    pub request_timeout_secs: u64,
}
