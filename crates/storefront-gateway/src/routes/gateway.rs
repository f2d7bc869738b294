//! Catch-all request dispatch: facade prefix first, then the static
//! prefix-routing table over the four backends.

use actix_web::{web, HttpRequest, HttpResponse, ResponseError};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::proxy;
use crate::state::AppState;

use super::facade;

/// Path prefix of the frontend-facing facade API.
const FACADE_PREFIX: &str = "/api/gw/v1";

/// Dispatch handler mounted as the application's default service, so every
/// path and method that survives the middleware chain lands here.
pub async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    match route(&req, body, &state).await {
        Ok(response) => response,
        Err(e) => e.error_response(),
    }
}

async fn route(
    req: &HttpRequest,
    body: web::Bytes,
    state: &AppState,
) -> Result<HttpResponse, GatewayError> {
    let path = req.path();
    tracing::debug!(method = %req.method(), path = %path, "gateway received request");

    if let Some(facade_path) = strip_facade_prefix(path) {
        return facade::dispatch(req, facade_path, body, state).await;
    }

    let mut target_url = route_target(&state.config, path);
    if !req.query_string().is_empty() {
        target_url = format!("{}?{}", target_url, req.query_string());
    }
    proxy::forward_request(&state.http_client, req, &target_url, body).await
}

/// The facade owns `/api/gw/v1/...`. The bare prefix without a trailing slash
/// routes as a plain `/api/*` path instead.
fn strip_facade_prefix(path: &str) -> Option<&str> {
    path.strip_prefix(FACADE_PREFIX)
        .filter(|rest| rest.starts_with('/'))
}

/// Resolve a non-facade path to its backend target URL. Routing prefixes are
/// stripped, except `/mcp/*` which the MCP service expects verbatim; its
/// health probe is the one sub-path mapped onto the service root.
pub fn route_target(config: &GatewayConfig, path: &str) -> String {
    if let Some(rest) = strip_route_prefix(path, "/rest") {
        format!("{}{}", config.postgrest_url, rest)
    } else if let Some(rest) = strip_route_prefix(path, "/api") {
        format!("{}{}", config.backend_api_url, rest)
    } else if path.starts_with("/mcp/") {
        if path == "/mcp/health" {
            format!("{}/health", config.mcp_service_url)
        } else {
            format!("{}{}", config.mcp_service_url, path)
        }
    } else if let Some(rest) = strip_route_prefix(path, "/worker") {
        format!("{}{}", config.worker_service_url, rest)
    } else {
        // Backward-compatibility default: unprefixed paths go to PostgREST.
        format!("{}{}", config.postgrest_url, path)
    }
}

fn strip_route_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)
        .filter(|rest| rest.starts_with('/'))
}
