//! # V1 API Response Envelope & Error Contract
//!
//! Every v1 endpoint returns an [`ApiResponse<T>`] envelope:
//!
//! ```json
//! {
//!   "data": { ... },       // present on success, absent on error
//!   "meta": { "total": 3 }, // optional
//!   "error": { "code": "conflict", "message": "..." }  // present on error, absent on success
//! }
//! ```
//!
//! ## ID Formats
//!
//! - **requestId**: nanoid, 21 characters (e.g. `"V1StGXR8_Z5jdHi6B-myT"`)
//! - **knowledge entry id**: nanoid, 21 characters

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::HandoffError;

/// Machine-readable error code included in every error response.
///
/// Serialized as a snake_case string on the wire (e.g. `"invalid_request"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed body, unknown status filter, blank answer. HTTP 400.
    InvalidRequest,
    /// HTTP 404.
    NotFound,
    /// The request is no longer pending, or its window closed. HTTP 409.
    Conflict,
    /// Internal details are never leaked to the client. HTTP 500.
    InternalError,
    /// An upstream call made on the caller's behalf failed. HTTP 502.
    UpstreamError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::InternalError => write!(f, "internal_error"),
            Self::UpstreamError => write!(f, "upstream_error"),
        }
    }
}

/// Structured error payload within the API envelope.
///
/// ```json
/// { "code": "not_found", "message": "Help request abc not found" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    pub code: ErrorCode,
    /// Safe to show to a supervisor.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Number of items in `data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Canonical v1 API response envelope.
///
/// On success `data` is present and `error` is absent; on error the reverse.
/// The HTTP status comes from the error code or from the constructor used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,

    /// Not serialized on the wire.
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// HTTP 200.
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
            status: StatusCode::OK,
        }
    }

    pub fn success_with_meta(data: T, meta: ResponseMeta) -> Self {
        Self {
            data: Some(data),
            meta: Some(meta),
            error: None,
            status: StatusCode::OK,
        }
    }

    /// HTTP 201.
    pub fn created(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
            status: StatusCode::CREATED,
        }
    }

    /// Error response. HTTP status is derived from the [`ErrorCode`].
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let status = code.status();
        Self {
            data: None,
            meta: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
            status,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        match serde_json::to_value(&self) {
            Ok(body) => (status, Json(body)).into_response(),
            Err(_) => {
                let body = serde_json::json!({
                    "error": {
                        "code": "internal_error",
                        "message": "An internal error occurred"
                    }
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl<T: Serialize> From<HandoffError> for ApiResponse<T> {
    /// Internal error details are **never** leaked to the client. For
    /// `internal_error` responses a generic message is returned and the real
    /// error is logged via `tracing::error!`.
    fn from(err: HandoffError) -> Self {
        match err {
            HandoffError::NotFound(msg) => ApiResponse::error(ErrorCode::NotFound, msg),

            HandoffError::Validation(msg) | HandoffError::Subscription(msg) => {
                ApiResponse::error(ErrorCode::InvalidRequest, msg)
            }

            HandoffError::Json(ref e) => {
                ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid JSON: {e}"))
            }

            HandoffError::Conflict(msg) => ApiResponse::error(ErrorCode::Conflict, msg),

            ref in_flight @ HandoffError::SubmissionInFlight(_) => {
                ApiResponse::error(ErrorCode::Conflict, in_flight.to_string())
            }

            HandoffError::Submission(msg) => ApiResponse::error(ErrorCode::UpstreamError, msg),

            ref internal @ (HandoffError::Database(_)
            | HandoffError::Http(_)
            | HandoffError::Io(_)
            | HandoffError::Internal(_)) => {
                tracing::error!(error = %internal, "Internal error mapped to v1 response");
                ApiResponse::error(ErrorCode::InternalError, "An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_serializes_without_error() {
        let resp = ApiResponse::success("hello");
        let json = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(json["data"], "hello");
        assert!(json.get("error").is_none());
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn error_response_serializes_without_data() {
        let resp = ApiResponse::<()>::error(ErrorCode::Conflict, "already resolved");
        let json = serde_json::to_value(&resp).expect("serialize");
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["code"], "conflict");
        assert_eq!(json["error"]["message"], "already resolved");
    }

    #[test]
    fn success_with_meta_serializes_total() {
        let resp = ApiResponse::success_with_meta(vec![1, 2, 3], ResponseMeta { total: Some(3) });
        let json = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["meta"]["total"], 3);
    }

    #[test]
    fn created_response_has_201_status() {
        let resp = ApiResponse::created("R1");
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[test]
    fn error_code_serializes_snake_case() {
        let json = serde_json::to_value(&ErrorCode::InvalidRequest).expect("serialize");
        assert_eq!(json, "invalid_request");
        let code: ErrorCode = serde_json::from_str("\"not_found\"").expect("deserialize");
        assert_eq!(code, ErrorCode::NotFound);
        assert_eq!(ErrorCode::UpstreamError.to_string(), "upstream_error");
    }

    #[test]
    fn conflict_maps_to_409() {
        let resp: ApiResponse<()> =
            HandoffError::Conflict("Help request R1 is already resolved".into()).into();
        let err = resp.error.as_ref().expect("error");
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_error_does_not_leak() {
        let resp: ApiResponse<()> = HandoffError::Internal("secret debug info".into()).into();
        let err = resp.error.as_ref().expect("error");
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.message, "An internal error occurred");
    }

    #[test]
    fn validation_maps_to_invalid_request() {
        let resp: ApiResponse<()> = HandoffError::Validation("answer must not be empty".into()).into();
        assert_eq!(resp.error.expect("error").code, ErrorCode::InvalidRequest);
    }
}
