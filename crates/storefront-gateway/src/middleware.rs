//! Access-log and API-key auth stages of the middleware chain.
//!
//! Each stage is an `actix_web::middleware::from_fn` function so the chain
//! stays an explicit ordered list with obvious short-circuit points. Runtime
//! order is CORS -> access log -> auth -> router; in `main` that means auth is
//! wrapped first and CORS last.

use std::sync::Arc;
use std::time::Instant;

use actix_web::body::{BodySize, BoxBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::error::PayloadError;
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage, HttpResponse};
use futures::StreamExt;

use crate::config::GatewayConfig;

/// Access-log middleware stage.
///
/// Buffers the request body so downstream stages can re-read it (the payload
/// stream is otherwise consumed exactly once), then emits one structured log
/// event per request after the inner call completes. Logging never fails the
/// request.
pub async fn access_log(
    mut req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.path().to_string();
    let ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = buffer_payload(&mut req).await;
    let request_size = body.len();
    req.set_payload(bytes_payload(body));

    let res = next.call(req).await?;

    let status = res.status().as_u16();
    let response_size = match res.response().body().size() {
        BodySize::Sized(n) => n,
        _ => 0,
    };

    tracing::info!(
        method = %method,
        path = %path,
        status,
        ip = %ip,
        user_agent = %user_agent,
        request_size,
        response_size,
        duration_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    Ok(res)
}

/// Drain the request payload into memory, tolerating read failures.
async fn buffer_payload(req: &mut ServiceRequest) -> web::Bytes {
    let mut payload = req.take_payload();
    let mut buf = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(_) => break,
        }
    }
    buf.freeze()
}

/// Re-wrap buffered bytes as a payload stream for downstream extractors.
fn bytes_payload(body: web::Bytes) -> Payload {
    Payload::Stream {
        payload: Box::pin(futures::stream::once(async move {
            Ok::<_, PayloadError>(body)
        })),
    }
}

/// Best-effort client IP: `X-Forwarded-For`, then `X-Real-IP`, then the peer
/// address.
pub fn client_ip(req: &ServiceRequest) -> String {
    for name in ["X-Forwarded-For", "X-Real-IP"] {
        if let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    req.peer_addr().map(|a| a.to_string()).unwrap_or_default()
}

/// API-key auth middleware stage.
///
/// When a key is configured, the request must carry it in the `X-API-Key`
/// header or the `api_key` query parameter; otherwise the stage answers `401`
/// with a bare `{"error": ...}` body. That body is deliberately not the
/// response envelope; existing clients depend on the bare shape. With no key
/// configured the stage is a no-op (fail-open).
pub async fn api_key_auth(
    config: Arc<GatewayConfig>,
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    if let Some(expected) = config.api_key.as_deref() {
        let provided = req
            .headers()
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .or_else(|| query_param(req.query_string(), "api_key"));

        let authorized = provided
            .as_deref()
            .map(|key| constant_time_eq(key.as_bytes(), expected.as_bytes()))
            .unwrap_or(false);

        if !authorized {
            let res = HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Unauthorized: Invalid or missing API key"
            }));
            return Ok(req.into_response(res));
        }
    }

    next.call(req).await
}

pub(crate) fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Constant-time byte comparison that does not leak input lengths.
/// Both inputs are hashed to fixed-length digests before comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use sha2::{Digest, Sha256};
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    let mut result = 0u8;
    for (x, y) in ha.iter().zip(hb.iter()) {
        result |= x ^ y;
    }
    result == 0
}
