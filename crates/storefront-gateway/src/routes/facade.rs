//! Frontend-facing facade endpoints.
//!
//! Every facade endpoint follows the same validate -> forward -> shape
//! contract, so the endpoints exist only as rows in a declarative dispatch
//! table: a validator for the input, a builder for the fixed backend path,
//! and a shaping function for the backend's JSON. A single generic handler
//! drives the table.

use actix_web::http::{Method, StatusCode};
use actix_web::web::Bytes;
use actix_web::{HttpRequest, HttpResponse};
use serde_json::{json, Map, Value};

use crate::envelope::{self, stringify_field, ErrorInfo};
use crate::error::GatewayError;
use crate::middleware::query_param;
use crate::proxy;
use crate::state::AppState;
use crate::validation::{self, JsonObject};

/// Versioned prefix the backend API serves under.
const BACKEND_API_PREFIX: &str = "/api/v1";

/// How an endpoint obtains and validates its input.
enum Input {
    /// No input beyond the path
    None,
    /// JSON object body, checked by the validator before forwarding
    Json(fn(&JsonObject) -> Result<(), ErrorInfo>),
    /// `cartId` query parameter
    CartIdQuery,
    /// Identifier path segment following the resource name; `field` names the
    /// missing identifier in the validation error
    PathId { field: &'static str },
}

/// How a backend error body (status >= 400) maps onto `ErrorInfo`.
#[derive(Clone, Copy)]
enum ErrorShape {
    /// `code`/`message`/`details` lifted from the body when present
    Full,
    /// Like `Full`, but the message falls back to the `error` field and then
    /// to a generic text instead of the `"<nil>"` placeholder
    FullWithFallback,
    /// Fixed `BACKEND_ERROR` code with a stringified `message` only
    MessageOnly,
}

/// A facade endpoint: the unit of business logic in the gateway.
struct FacadeEndpoint {
    name: &'static str,
    backend_method: reqwest::Method,
    input: Input,
    backend_path: fn(&FacadeContext) -> String,
    shape: fn(&FacadeContext, Value) -> Value,
    error_shape: ErrorShape,
}

/// One row of the ordered dispatch table. First match wins.
struct FacadeRule {
    /// Path prefix relative to the facade root
    prefix: &'static str,
    /// Extra substring the path must contain
    contains: Option<&'static str>,
    /// Method this row applies to; None matches any method
    method: Option<Method>,
    /// None marks the prefix as claimed: unlisted methods skip the rest of
    /// the table and proxy generically
    endpoint: Option<&'static FacadeEndpoint>,
}

/// Per-request input assembled during validation.
#[derive(Default, Debug)]
struct FacadeContext {
    body: Option<JsonObject>,
    cart_id: Option<String>,
    id: Option<String>,
}

static ADD_CART_ITEM: FacadeEndpoint = FacadeEndpoint {
    name: "add_cart_item",
    backend_method: reqwest::Method::POST,
    input: Input::Json(validation::validate_cart_item),
    backend_path: |_| format!("{BACKEND_API_PREFIX}/cart/items"),
    shape: |_, backend| {
        json!({
            "cartId": backend.get("cartId").cloned().unwrap_or(Value::Null),
            "cart": backend.get("cart").cloned().unwrap_or(Value::Null),
        })
    },
    error_shape: ErrorShape::Full,
};

static UPDATE_CART_ITEM: FacadeEndpoint = FacadeEndpoint {
    name: "update_cart_item",
    backend_method: reqwest::Method::PUT,
    input: Input::Json(|body| validation::require_string_fields(body, &["cartId", "lineId"])),
    backend_path: |_| format!("{BACKEND_API_PREFIX}/cart/items"),
    shape: cart_body_shape,
    error_shape: ErrorShape::MessageOnly,
};

static REMOVE_CART_ITEM: FacadeEndpoint = FacadeEndpoint {
    name: "remove_cart_item",
    backend_method: reqwest::Method::DELETE,
    input: Input::Json(|body| validation::require_string_fields(body, &["cartId", "lineId"])),
    backend_path: |_| format!("{BACKEND_API_PREFIX}/cart/items"),
    shape: cart_body_shape,
    error_shape: ErrorShape::MessageOnly,
};

static GET_CART: FacadeEndpoint = FacadeEndpoint {
    name: "get_cart",
    backend_method: reqwest::Method::GET,
    input: Input::CartIdQuery,
    backend_path: |ctx| {
        format!(
            "{BACKEND_API_PREFIX}/cart/{}",
            ctx.cart_id.as_deref().unwrap_or_default()
        )
    },
    shape: |ctx, backend| json!({"cartId": ctx.cart_id, "cart": backend}),
    error_shape: ErrorShape::MessageOnly,
};

static CHECKOUT: FacadeEndpoint = FacadeEndpoint {
    name: "checkout",
    backend_method: reqwest::Method::POST,
    input: Input::Json(|body| validation::require_string_fields(body, &["cartId"])),
    backend_path: |_| format!("{BACKEND_API_PREFIX}/cart/checkout"),
    shape: |_, backend| backend,
    error_shape: ErrorShape::MessageOnly,
};

static CREATE_DEPOSIT_SESSION: FacadeEndpoint = FacadeEndpoint {
    name: "create_deposit_session",
    backend_method: reqwest::Method::POST,
    input: Input::Json(|body| validation::require_string_fields(body, &["cartId"])),
    backend_path: |_| format!("{BACKEND_API_PREFIX}/deposit-sessions"),
    shape: shape_deposit_session,
    error_shape: ErrorShape::FullWithFallback,
};

static DEPOSIT_SESSION_CHECKOUT: FacadeEndpoint = FacadeEndpoint {
    name: "deposit_session_checkout",
    backend_method: reqwest::Method::POST,
    input: Input::PathId { field: "sessionId" },
    backend_path: |ctx| {
        format!(
            "{BACKEND_API_PREFIX}/deposit-sessions/{}/checkout",
            ctx.id.as_deref().unwrap_or_default()
        )
    },
    shape: |_, backend| backend,
    error_shape: ErrorShape::MessageOnly,
};

static GET_DEPOSIT_SESSION: FacadeEndpoint = FacadeEndpoint {
    name: "get_deposit_session",
    backend_method: reqwest::Method::GET,
    input: Input::PathId { field: "sessionId" },
    backend_path: |ctx| {
        format!(
            "{BACKEND_API_PREFIX}/deposit-sessions/{}",
            ctx.id.as_deref().unwrap_or_default()
        )
    },
    shape: |_, backend| json!({"session": backend}),
    error_shape: ErrorShape::MessageOnly,
};

static LIST_DEPOSIT_PLANS: FacadeEndpoint = FacadeEndpoint {
    name: "list_deposit_plans",
    backend_method: reqwest::Method::GET,
    input: Input::None,
    backend_path: |_| format!("{BACKEND_API_PREFIX}/deposit-plans"),
    shape: |_, backend| backend,
    error_shape: ErrorShape::MessageOnly,
};

static DEFAULT_DEPOSIT_PLAN: FacadeEndpoint = FacadeEndpoint {
    name: "default_deposit_plan",
    backend_method: reqwest::Method::GET,
    input: Input::None,
    backend_path: |_| format!("{BACKEND_API_PREFIX}/deposit-plans/default"),
    shape: |_, backend| backend,
    error_shape: ErrorShape::MessageOnly,
};

static GET_DEPOSIT_PLAN: FacadeEndpoint = FacadeEndpoint {
    name: "get_deposit_plan",
    backend_method: reqwest::Method::GET,
    input: Input::PathId { field: "planId" },
    backend_path: |ctx| {
        format!(
            "{BACKEND_API_PREFIX}/deposit-plans/{}",
            ctx.id.as_deref().unwrap_or_default()
        )
    },
    shape: |_, backend| backend,
    error_shape: ErrorShape::MessageOnly,
};

static ORDER_STATUS: FacadeEndpoint = FacadeEndpoint {
    name: "order_status",
    backend_method: reqwest::Method::GET,
    input: Input::PathId { field: "orderId" },
    backend_path: |ctx| {
        format!(
            "{BACKEND_API_PREFIX}/orders/{}",
            ctx.id.as_deref().unwrap_or_default()
        )
    },
    shape: |_, backend| backend,
    error_shape: ErrorShape::MessageOnly,
};

/// Dispatch table, evaluated top to bottom. The method-less `/cart/items` row
/// keeps unlisted methods on that prefix out of the `GET /cart` rule below it.
static FACADE_RULES: &[FacadeRule] = &[
    FacadeRule {
        prefix: "/cart/items",
        contains: None,
        method: Some(Method::POST),
        endpoint: Some(&ADD_CART_ITEM),
    },
    FacadeRule {
        prefix: "/cart/items",
        contains: None,
        method: Some(Method::PUT),
        endpoint: Some(&UPDATE_CART_ITEM),
    },
    FacadeRule {
        prefix: "/cart/items",
        contains: None,
        method: Some(Method::DELETE),
        endpoint: Some(&REMOVE_CART_ITEM),
    },
    FacadeRule {
        prefix: "/cart/items",
        contains: None,
        method: None,
        endpoint: None,
    },
    FacadeRule {
        prefix: "/cart",
        contains: None,
        method: Some(Method::GET),
        endpoint: Some(&GET_CART),
    },
    FacadeRule {
        prefix: "/cart/checkout",
        contains: None,
        method: Some(Method::POST),
        endpoint: Some(&CHECKOUT),
    },
    FacadeRule {
        prefix: "/deposit-sessions/create-from-cart",
        contains: None,
        method: Some(Method::POST),
        endpoint: Some(&CREATE_DEPOSIT_SESSION),
    },
    FacadeRule {
        prefix: "/deposit-sessions/",
        contains: Some("/checkout"),
        method: Some(Method::POST),
        endpoint: Some(&DEPOSIT_SESSION_CHECKOUT),
    },
    FacadeRule {
        prefix: "/deposit-sessions/",
        contains: None,
        method: Some(Method::GET),
        endpoint: Some(&GET_DEPOSIT_SESSION),
    },
    FacadeRule {
        prefix: "/deposit-plans/default",
        contains: None,
        method: Some(Method::GET),
        endpoint: Some(&DEFAULT_DEPOSIT_PLAN),
    },
    FacadeRule {
        prefix: "/deposit-plans/",
        contains: None,
        method: Some(Method::GET),
        endpoint: Some(&GET_DEPOSIT_PLAN),
    },
    FacadeRule {
        prefix: "/deposit-plans",
        contains: None,
        method: Some(Method::GET),
        endpoint: Some(&LIST_DEPOSIT_PLANS),
    },
    FacadeRule {
        prefix: "/orders/",
        contains: None,
        method: Some(Method::GET),
        endpoint: Some(&ORDER_STATUS),
    },
];

fn match_rule(path: &str, method: &Method) -> Option<&'static FacadeRule> {
    FACADE_RULES.iter().find(|rule| {
        path.starts_with(rule.prefix)
            && rule.contains.map_or(true, |needle| path.contains(needle))
            && rule.method.as_ref().map_or(true, |m| m == method)
    })
}

/// Entry point for `/api/gw/v1/*` paths. `facade_path` is the path with the
/// facade prefix already stripped (leading slash kept).
pub async fn dispatch(
    req: &HttpRequest,
    facade_path: &str,
    body: Bytes,
    state: &AppState,
) -> Result<HttpResponse, GatewayError> {
    if let Some(endpoint) = match_rule(facade_path, req.method()).and_then(|rule| rule.endpoint) {
        tracing::debug!(endpoint = endpoint.name, path = %facade_path, "dispatching facade endpoint");
        return handle(endpoint, req, facade_path, body, state).await;
    }

    // No facade entry: proxy to the backend API under its versioned prefix.
    let mut target_url = format!(
        "{}{}{}",
        state.config.backend_api_url, BACKEND_API_PREFIX, facade_path
    );
    if !req.query_string().is_empty() {
        target_url = format!("{}?{}", target_url, req.query_string());
    }
    proxy::forward_request(&state.http_client, req, &target_url, body).await
}

/// The generic transformer: validate, forward, shape.
async fn handle(
    endpoint: &FacadeEndpoint,
    req: &HttpRequest,
    facade_path: &str,
    body: Bytes,
    state: &AppState,
) -> Result<HttpResponse, GatewayError> {
    let ctx = match build_context(endpoint, req, facade_path, &body) {
        Ok(ctx) => ctx,
        Err(info) => return Ok(envelope::failure(StatusCode::BAD_REQUEST, info)),
    };

    let target_url = format!(
        "{}{}",
        state.config.backend_api_url,
        (endpoint.backend_path)(&ctx)
    );
    let payload = match &ctx.body {
        Some(body) => {
            Some(serde_json::to_vec(body).map_err(|e| GatewayError::Internal(e.to_string()))?)
        }
        None => None,
    };

    let (status, backend) = proxy::call_backend_json(
        &state.http_client,
        endpoint.backend_method.clone(),
        &target_url,
        payload,
    )
    .await?;

    if status.as_u16() >= 400 {
        tracing::debug!(
            endpoint = endpoint.name,
            status = status.as_u16(),
            "backend returned error status"
        );
        return Ok(envelope::failure(
            status,
            shape_backend_error(endpoint.error_shape, &backend),
        ));
    }

    Ok(envelope::success((endpoint.shape)(&ctx, backend)))
}

fn build_context(
    endpoint: &FacadeEndpoint,
    req: &HttpRequest,
    facade_path: &str,
    body: &Bytes,
) -> Result<FacadeContext, ErrorInfo> {
    let mut ctx = FacadeContext::default();
    match &endpoint.input {
        Input::None => {}
        Input::Json(validator) => {
            let decoded: JsonObject = serde_json::from_slice(body)
                .map_err(|_| ErrorInfo::validation("Invalid request body"))?;
            validator(&decoded)?;
            ctx.body = Some(decoded);
        }
        Input::CartIdQuery => {
            let cart_id = query_param(req.query_string(), "cartId")
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ErrorInfo::validation("cartId query parameter is required"))?;
            ctx.cart_id = Some(cart_id);
        }
        Input::PathId { field } => {
            let id = facade_path
                .split('/')
                .nth(2)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ErrorInfo::validation(format!("{field} is required")))?;
            ctx.id = Some(id.to_string());
        }
    }
    Ok(ctx)
}

/// `{cartId, cart}` projection for cart mutations: the identifier comes from
/// the request body, the cart from the backend response.
fn cart_body_shape(ctx: &FacadeContext, backend: Value) -> Value {
    let cart_id = ctx
        .body
        .as_ref()
        .and_then(|body| body.get("cartId"))
        .cloned()
        .unwrap_or(Value::Null);
    json!({"cartId": cart_id, "cart": backend})
}

/// Normalize the deposit-session creation response onto the stable snake_case
/// contract, reconciling the backend's snake_case/camelCase field variants.
/// When the session identifier is missing the raw backend body is returned.
fn shape_deposit_session(_ctx: &FacadeContext, backend: Value) -> Value {
    let session_id = match backend.get("session_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            tracing::warn!("session_id not found in backend response, returning full response");
            return backend;
        }
    };

    let mut data = Map::new();
    data.insert(
        "deposit_session_url".to_string(),
        json!(format!("/deposit-session/{session_id}")),
    );
    data.insert("session_id".to_string(), json!(session_id));

    if let Some(url) = reconciled_string(&backend, "checkout_url", "checkoutUrl", true) {
        data.insert("checkout_url".to_string(), json!(url));
    }
    if let Some(ids) = reconciled_array(&backend, "draft_order_ids", "draftOrderIds") {
        data.insert("draft_order_ids".to_string(), Value::Array(ids));
    }
    if let Some(id) = reconciled_string(&backend, "first_draft_order_id", "firstDraftOrderId", false)
    {
        data.insert("first_draft_order_id".to_string(), json!(id));
    }
    if let Some(amounts) = reconciled_array(&backend, "payment_amounts", "paymentAmounts") {
        data.insert("payment_amounts".to_string(), Value::Array(amounts));
    }

    Value::Object(data)
}

/// First usable string among the snake_case and camelCase spellings of a
/// backend field.
fn reconciled_string(
    backend: &Value,
    snake: &str,
    camel: &str,
    require_non_empty: bool,
) -> Option<String> {
    for key in [snake, camel] {
        if let Some(s) = backend.get(key).and_then(Value::as_str) {
            if !require_non_empty || !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// First array among the snake_case and camelCase spellings of a backend
/// field.
fn reconciled_array(backend: &Value, snake: &str, camel: &str) -> Option<Vec<Value>> {
    for key in [snake, camel] {
        if let Some(arr) = backend.get(key).and_then(Value::as_array) {
            return Some(arr.clone());
        }
    }
    None
}

fn shape_backend_error(shape: ErrorShape, backend: &Value) -> ErrorInfo {
    let code = match shape {
        ErrorShape::MessageOnly => envelope::BACKEND_ERROR.to_string(),
        ErrorShape::Full | ErrorShape::FullWithFallback => backend
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or(envelope::BACKEND_ERROR)
            .to_string(),
    };

    let message = match shape {
        ErrorShape::FullWithFallback => backend
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| backend.get("error").and_then(Value::as_str))
            .unwrap_or("An error occurred")
            .to_string(),
        ErrorShape::Full | ErrorShape::MessageOnly => stringify_field(backend.get("message")),
    };

    let details = match shape {
        ErrorShape::MessageOnly => None,
        ErrorShape::Full | ErrorShape::FullWithFallback => {
            backend.get("details").cloned().filter(|v| !v.is_null())
        }
    };

    ErrorInfo {
        code,
        message,
        details,
    }
}
