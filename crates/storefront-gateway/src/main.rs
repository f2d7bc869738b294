use actix_web::middleware::from_fn;
use actix_web::{web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_gateway::{config::GatewayConfig, cors, middleware, routes, state::AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().expect("Failed to load configuration");
    let port = config.port;

    tracing::info!("Starting storefront-gateway on port {}", port);
    tracing::info!("PostgREST backend: {}", config.postgrest_url);
    tracing::info!("Backend API: {}", config.backend_api_url);
    tracing::info!("MCP service: {}", config.mcp_service_url);
    tracing::info!("Worker service: {}", config.worker_service_url);
    tracing::info!("Routing:");
    tracing::info!("  /api/gw/v1/* -> frontend facade");
    tracing::info!("  /rest/*      -> PostgREST");
    tracing::info!("  /api/*       -> backend API");
    tracing::info!("  /mcp/*       -> MCP service");
    tracing::info!("  /worker/*    -> worker service");
    tracing::info!("  (default)    -> PostgREST");
    tracing::info!(
        "Authentication: {}",
        if config.api_key.is_some() {
            "enabled (API key)"
        } else {
            "disabled"
        }
    );

    // Create shared state
    let state = AppState::new(config);
    let auth_config = state.config.clone();
    let state_data = web::Data::new(state);

    // Start HTTP server. Stage order is CORS -> access log -> auth -> router,
    // so auth is wrapped first and CORS last.
    HttpServer::new(move || {
        let auth_config = auth_config.clone();
        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(10 * 1024 * 1024)) // 10MB body limit
            .wrap(from_fn(move |req, next| {
                middleware::api_key_auth(auth_config.clone(), req, next)
            }))
            .wrap(from_fn(middleware::access_log))
            .wrap(from_fn(cors::cors))
            .default_service(web::to(routes::gateway::dispatch))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
