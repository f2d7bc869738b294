use std::sync::Arc;

use crate::config::GatewayConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");

        Self {
            config: Arc::new(config),
            http_client,
        }
    }
}
