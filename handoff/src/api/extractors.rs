use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::HandoffError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(HandoffError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for HandoffError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> HandoffError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                HandoffError::Validation(format!("Missing required field: {field}"))
            } else {
                HandoffError::Validation(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            HandoffError::Validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            HandoffError::Validation("Missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(_) => {
            HandoffError::Internal("Failed to read request body".to_string())
        }
        _ => HandoffError::Validation(rejection.to_string()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}
