use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::{HttpRequest, HttpResponse};
use serde_json::Value;

use crate::error::GatewayError;

/// Response headers owned by the gateway's CORS stage. Upstream copies are
/// dropped so clients never see duplicate or contradictory CORS headers.
const CORS_RESPONSE_HEADERS: &[&str] = &[
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
    "access-control-expose-headers",
    "access-control-allow-credentials",
    "access-control-max-age",
];

/// Proxy an HTTP request to the target URL, passing the body through
/// byte-for-byte.
///
/// Every inbound header except `Host` is forwarded; every response header
/// except the CORS set is copied back along with the upstream status code.
pub async fn forward_request(
    client: &reqwest::Client,
    original_req: &HttpRequest,
    target_url: &str,
    body: Bytes,
) -> Result<HttpResponse, GatewayError> {
    let method = reqwest::Method::from_bytes(original_req.method().as_str().as_bytes())
        .map_err(|_| {
            GatewayError::Internal(format!(
                "unsupported HTTP method: {}",
                original_req.method()
            ))
        })?;

    let mut request_builder = client.request(method, target_url);

    // Copy headers from the original request (except Host)
    for (name, value) in original_req.headers() {
        if name.as_str().eq_ignore_ascii_case("host") {
            continue;
        }
        request_builder = request_builder.header(name.as_str(), value.as_bytes());
    }

    if !body.is_empty() {
        request_builder = request_builder.body(body.to_vec());
    }

    let response = request_builder.send().await.map_err(|e| {
        tracing::error!(target_url = %target_url, error = %e, "proxy request failed");
        GatewayError::Upstream("Failed to reach upstream service".to_string())
    })?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::OK);
    let headers = response.headers().clone();

    let body = response.bytes().await.map_err(|e| {
        tracing::error!(target_url = %target_url, error = %e, "failed to read proxy response body");
        GatewayError::Upstream("Failed to read upstream response".to_string())
    })?;

    let mut builder = HttpResponse::build(status);
    for (name, value) in headers.iter() {
        if CORS_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        builder.append_header((name.as_str(), value.as_bytes()));
    }

    Ok(builder.body(body))
}

/// Call a backend with a fixed method and path on behalf of a facade
/// endpoint, decoding the response as JSON.
///
/// Non-GET calls are sent as `application/json` even when the body is empty.
/// A body that fails to decode yields `Value::Null` rather than an error; the
/// facade shaping layer degrades gracefully on missing fields.
pub async fn call_backend_json(
    client: &reqwest::Client,
    method: reqwest::Method,
    target_url: &str,
    body: Option<Vec<u8>>,
) -> Result<(StatusCode, Value), GatewayError> {
    let mut request_builder = client.request(method.clone(), target_url);

    if method != reqwest::Method::GET {
        request_builder = request_builder.header("Content-Type", "application/json");
    }
    if let Some(body) = body {
        request_builder = request_builder.body(body);
    }

    let response = request_builder.send().await.map_err(|e| {
        tracing::error!(target_url = %target_url, error = %e, "backend API request failed");
        GatewayError::Upstream("Failed to connect to backend API".to_string())
    })?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::OK);
    let payload = response.json::<Value>().await.unwrap_or(Value::Null);

    Ok((status, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_response_headers_list() {
        assert!(CORS_RESPONSE_HEADERS.contains(&"access-control-allow-origin"));
        assert!(CORS_RESPONSE_HEADERS.contains(&"access-control-max-age"));
        assert!(!CORS_RESPONSE_HEADERS.contains(&"content-type"));
        assert!(!CORS_RESPONSE_HEADERS.contains(&"content-range"));
    }
}
