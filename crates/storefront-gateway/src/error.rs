use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::envelope::{self, ErrorInfo};

#[derive(Debug)]
pub enum GatewayError {
    /// Request failed local validation before any backend call
    Validation(ErrorInfo),
    /// Upstream unreachable or failed at the transport level
    Upstream(String),
    /// Internal error
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Validation(info) => write!(f, "validation error: {}", info.message),
            GatewayError::Upstream(msg) => write!(f, "upstream error: {}", msg),
            GatewayError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::Validation(info) => {
                envelope::failure(StatusCode::BAD_REQUEST, info.clone())
            }
            GatewayError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                envelope::failure(StatusCode::BAD_GATEWAY, ErrorInfo::backend(msg.clone()))
            }
            GatewayError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                envelope::failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorInfo::new("INTERNAL_ERROR", "An internal error occurred"),
                )
            }
        }
    }
}
