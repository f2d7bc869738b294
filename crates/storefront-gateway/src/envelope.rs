//! The `{data, error}` response envelope shared by every facade and proxy
//! JSON response. Both fields are always serialized (null when absent) so
//! clients get a stable shape.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::Value;

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const BACKEND_ERROR: &str = "BACKEND_ERROR";

#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub data: Value,
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(VALIDATION_ERROR, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(BACKEND_ERROR, message)
    }
}

/// Build an enveloped response with the given status code.
pub fn respond(status: StatusCode, data: Value, error: Option<ErrorInfo>) -> HttpResponse {
    HttpResponse::build(status).json(ResponseEnvelope { data, error })
}

/// 200 envelope around `data`.
pub fn success(data: Value) -> HttpResponse {
    respond(StatusCode::OK, data, None)
}

/// Enveloped error with `data: null`.
pub fn failure(status: StatusCode, error: ErrorInfo) -> HttpResponse {
    respond(status, Value::Null, Some(error))
}

/// Render an optional JSON field the way the upstream clients expect:
/// a missing or null value becomes the literal `"<nil>"` placeholder,
/// strings are used as-is, everything else renders as compact JSON.
pub fn stringify_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "<nil>".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
