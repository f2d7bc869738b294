//! CORS stage for the gateway.
//!
//! The gateway is the sole CORS authority: it stamps a fixed header set on
//! every response (upstream CORS headers are stripped by the forwarder) and
//! answers every `OPTIONS` request itself without invoking the rest of the
//! chain, so pre-flights are never logged, authenticated, or proxied.

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
};
use actix_web::http::Method;
use actix_web::middleware::Next;
use actix_web::{Error, HttpResponse};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-API-Key, Prefer";
const EXPOSE_HEADERS: &str = "Content-Range, Content-Encoding, Content-Length";

/// CORS middleware stage. Must be the outermost stage of the chain.
pub async fn cors(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    if req.method() == Method::OPTIONS {
        let mut res = HttpResponse::Ok().finish();
        apply_cors_headers(res.headers_mut());
        return Ok(req.into_response(res));
    }

    let mut res = next.call(req).await?;
    apply_cors_headers(res.response_mut().headers_mut());
    Ok(res)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static(EXPOSE_HEADERS));
}
