use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::v1::response::ApiResponse;

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The record exists but is no longer in a state that accepts the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("A submission for request {0} is already in flight")]
    SubmissionInFlight(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl HandoffError {
    /// True for errors the supervisor can fix by editing their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            HandoffError::Validation(_) | HandoffError::SubmissionInFlight(_)
        )
    }
}

/// Errors leave the service in the v1 envelope, see
/// [`ApiResponse`](crate::api::v1::response::ApiResponse).
impl IntoResponse for HandoffError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, HandoffError>;
