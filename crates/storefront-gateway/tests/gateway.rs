use actix_web::middleware::from_fn;
use actix_web::{test, web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Value};

use storefront_gateway::config::GatewayConfig;
use storefront_gateway::state::AppState;
use storefront_gateway::{cors, middleware, routes};

/// Start a real backend on an ephemeral port and return its base URL.
async fn spawn_backend() -> String {
    let server = HttpServer::new(|| {
        App::new()
            .route("/api/v1/cart/items", web::post().to(add_cart_item))
            .route(
                "/api/v1/cart/items",
                web::get().to(|| async { HttpResponse::Ok().json(json!({"proxied": true})) }),
            )
            .route(
                "/api/v1/cart/{id}",
                web::get().to(|path: web::Path<String>| async move {
                    HttpResponse::Ok().json(json!({"id": path.into_inner(), "lines": []}))
                }),
            )
            .route(
                "/api/v1/deposit-sessions",
                web::post().to(|| async {
                    HttpResponse::Ok().json(json!({
                        "session_id": "s1",
                        "checkoutUrl": "http://x",
                        "draftOrderIds": ["d1"],
                    }))
                }),
            )
            .route(
                "/api/v1/deposit-sessions/{id}",
                web::get().to(|path: web::Path<String>| async move {
                    HttpResponse::Ok()
                        .json(json!({"id": path.into_inner(), "status": "pending"}))
                }),
            )
            .route(
                "/api/v1/deposit-plans",
                web::get().to(|| async {
                    HttpResponse::Ok().json(json!([{"id": "p1"}, {"id": "p2"}]))
                }),
            )
            .route("/echo", web::get().to(echo))
            .route(
                "/x",
                web::get().to(|| async { HttpResponse::Ok().json(json!({"ok": true})) }),
            )
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("failed to bind mock backend");

    let addr = server.addrs()[0];
    actix_rt::spawn(server.run());
    format!("http://{}", addr)
}

async fn add_cart_item(body: web::Json<Value>) -> HttpResponse {
    if body.get("externalId").and_then(Value::as_str) == Some("trigger-conflict") {
        return HttpResponse::Conflict().json(json!({
            "code": "OUT_OF_STOCK",
            "message": "variant unavailable",
            "details": {"variantId": "v9"},
        }));
    }
    HttpResponse::Ok().json(json!({"cartId": "c1", "cart": {"lines": [body.into_inner()]}}))
}

async fn echo(req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("X-Upstream", "yes"))
        .insert_header(("Access-Control-Allow-Origin", "http://leaky.example"))
        .json(json!({
            "path": req.path(),
            "query": req.query_string(),
            "custom": req
                .headers()
                .get("X-Custom")
                .and_then(|v| v.to_str().ok())
                .unwrap_or(""),
        }))
}

fn state_for(backend: &str, api_key: Option<&str>) -> AppState {
    AppState::new(GatewayConfig {
        postgrest_url: backend.to_string(),
        backend_api_url: backend.to_string(),
        mcp_service_url: backend.to_string(),
        worker_service_url: backend.to_string(),
        api_key: api_key.map(String::from),
        port: 0,
    })
}

/// Assemble the gateway app the way `main` does: auth wrapped first, then the
/// access log, then CORS outermost.
macro_rules! gateway_app {
    ($state:expr) => {{
        let state = $state;
        let auth_config = state.config.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::PayloadConfig::new(10 * 1024 * 1024))
                .wrap(from_fn(move |req, next| {
                    middleware::api_key_auth(auth_config.clone(), req, next)
                }))
                .wrap(from_fn(middleware::access_log))
                .wrap(from_fn(cors::cors))
                .default_service(web::to(routes::gateway::dispatch)),
        )
        .await
    }};
}

#[actix_rt::test]
async fn test_options_short_circuits_with_cors_headers() {
    // No backend needed: pre-flights never leave the gateway
    let app = gateway_app!(state_for("http://127.0.0.1:1", Some("secret")));

    let req = test::TestRequest::with_uri("/rest/products")
        .method(actix_web::http::Method::OPTIONS)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    for (name, expected) in [
        ("Access-Control-Allow-Origin", "*"),
        (
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, PATCH, DELETE, OPTIONS",
        ),
        (
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-API-Key, Prefer",
        ),
        (
            "Access-Control-Expose-Headers",
            "Content-Range, Content-Encoding, Content-Length",
        ),
    ] {
        assert_eq!(
            resp.headers().get(name).and_then(|v| v.to_str().ok()),
            Some(expected),
            "missing or wrong header {name}"
        );
    }
    let body = test::read_body(resp).await;
    assert!(body.is_empty());
}

#[actix_rt::test]
async fn test_auth_gates_requests_end_to_end() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, Some("secret")));

    let req = test::TestRequest::get().uri("/rest/x").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Unauthorized: Invalid or missing API key"}));

    let req = test::TestRequest::get()
        .uri("/rest/x")
        .insert_header(("X-API-Key", "secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_rt::test]
async fn test_cart_item_validation_rejected_before_backend() {
    // Backend deliberately unreachable: validation must fail first
    let app = gateway_app!(state_for("http://127.0.0.1:1", None));

    let req = test::TestRequest::post()
        .uri("/api/gw/v1/cart/items")
        .set_json(json!({"source": "shopify"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["data"].is_null());
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "variantId is required for shopify items"
    );
}

#[actix_rt::test]
async fn test_cart_item_add_happy_path() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let req = test::TestRequest::post()
        .uri("/api/gw/v1/cart/items")
        .set_json(json!({"source": "external", "externalId": "x1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_null());
    assert_eq!(body["data"]["cartId"], "c1");
    assert_eq!(body["data"]["cart"]["lines"][0]["externalId"], "x1");
}

#[actix_rt::test]
async fn test_cart_item_backend_error_code_passthrough() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let req = test::TestRequest::post()
        .uri("/api/gw/v1/cart/items")
        .set_json(json!({"source": "external", "externalId": "trigger-conflict"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 409);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["data"].is_null());
    assert_eq!(body["error"]["code"], "OUT_OF_STOCK");
    assert_eq!(body["error"]["message"], "variant unavailable");
    assert_eq!(body["error"]["details"]["variantId"], "v9");
}

#[actix_rt::test]
async fn test_get_cart_requires_cart_id() {
    let app = gateway_app!(state_for("http://127.0.0.1:1", None));

    let req = test::TestRequest::get().uri("/api/gw/v1/cart").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["message"], "cartId query parameter is required");
}

#[actix_rt::test]
async fn test_get_cart_wraps_backend_body() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let req = test::TestRequest::get()
        .uri("/api/gw/v1/cart?cartId=c7")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["cartId"], "c7");
    assert_eq!(body["data"]["cart"]["id"], "c7");
}

#[actix_rt::test]
async fn test_deposit_session_create_reconciles_field_names() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let req = test::TestRequest::post()
        .uri("/api/gw/v1/deposit-sessions/create-from-cart")
        .set_json(json!({"cartId": "c1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_null());
    assert_eq!(body["data"]["session_id"], "s1");
    assert_eq!(body["data"]["deposit_session_url"], "/deposit-session/s1");
    // camelCase backend fields surface under the snake_case contract
    assert_eq!(body["data"]["checkout_url"], "http://x");
    assert_eq!(body["data"]["draft_order_ids"], json!(["d1"]));
}

#[actix_rt::test]
async fn test_deposit_session_fetch_wraps_session() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let req = test::TestRequest::get()
        .uri("/api/gw/v1/deposit-sessions/s42")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["session"]["id"], "s42");
    assert_eq!(body["data"]["session"]["status"], "pending");
}

#[actix_rt::test]
async fn test_unlisted_cart_items_method_proxies_generically() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let req = test::TestRequest::get()
        .uri("/api/gw/v1/cart/items")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    // Generic proxy passes the backend body through without the envelope
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"proxied": true}));
}

#[actix_rt::test]
async fn test_rest_proxy_forwards_path_query_and_headers() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let req = test::TestRequest::get()
        .uri("/rest/echo?x=1")
        .insert_header(("X-Custom", "hello"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    // Upstream headers come back, but the gateway stays the CORS authority
    assert_eq!(
        resp.headers().get("X-Upstream").and_then(|v| v.to_str().ok()),
        Some("yes")
    );
    assert_eq!(
        resp.headers()
            .get("Access-Control-Allow-Origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["path"], "/echo");
    assert_eq!(body["query"], "x=1");
    assert_eq!(body["custom"], "hello");
}

#[actix_rt::test]
async fn test_unreachable_backend_maps_to_502() {
    let app = gateway_app!(state_for("http://127.0.0.1:1", None));

    let req = test::TestRequest::get().uri("/rest/foo").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 502);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["data"].is_null());
    assert_eq!(body["error"]["code"], "BACKEND_ERROR");
}

#[actix_rt::test]
async fn test_facade_backend_unreachable_maps_to_502() {
    let app = gateway_app!(state_for("http://127.0.0.1:1", None));

    let req = test::TestRequest::post()
        .uri("/api/gw/v1/cart/checkout")
        .set_json(json!({"cartId": "c1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 502);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "BACKEND_ERROR");
    assert_eq!(body["error"]["message"], "Failed to connect to backend API");
}

#[actix_rt::test]
async fn test_repeated_facade_get_is_idempotent() {
    let backend = spawn_backend().await;
    let app = gateway_app!(state_for(&backend, None));

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/gw/v1/deposit-plans")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        bodies.push(test::read_body(resp).await);
    }
    assert_eq!(bodies[0], bodies[1]);

    let body: Value = serde_json::from_slice(&bodies[0]).unwrap();
    assert_eq!(body["data"], json!([{"id": "p1"}, {"id": "p2"}]));
}
