use std::env;

use url::Url;

const DEFAULT_POSTGREST_URL: &str = "https://postgrest-server.fly.dev";
const DEFAULT_BACKEND_API_URL: &str = "https://backend-api-dfcflow.fly.dev";
const DEFAULT_MCP_SERVICE_URL: &str = "https://mcp-service-dfcflow.fly.dev";
const DEFAULT_WORKER_SERVICE_URL: &str = "https://worker-service-dfcflow.fly.dev";
const DEFAULT_PORT: u16 = 8080;

#[derive(Clone)]
pub struct GatewayConfig {
    /// PostgREST data layer base URL
    pub postgrest_url: String,
    /// Backend application API base URL
    pub backend_api_url: String,
    /// MCP service base URL
    pub mcp_service_url: String,
    /// Worker service base URL
    pub worker_service_url: String,
    /// Shared API key; None disables authentication entirely
    pub api_key: Option<String>,
    /// Server port
    pub port: u16,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("postgrest_url", &self.postgrest_url)
            .field("backend_api_url", &self.backend_api_url)
            .field("mcp_service_url", &self.mcp_service_url)
            .field("worker_service_url", &self.worker_service_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("port", &self.port)
            .finish()
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let postgrest_url = backend_url_var("POSTGREST_URL", DEFAULT_POSTGREST_URL)?;
        let backend_api_url = backend_url_var("BACKEND_API_URL", DEFAULT_BACKEND_API_URL)?;
        let mcp_service_url = backend_url_var("MCP_SERVICE_URL", DEFAULT_MCP_SERVICE_URL)?;
        let worker_service_url = backend_url_var("WORKER_SERVICE_URL", DEFAULT_WORKER_SERVICE_URL)?;

        // Optional: API key. Absent or empty means the auth stage is a no-op.
        let api_key = env::var("API_KEY").ok().filter(|s| !s.is_empty());
        if api_key.is_none() {
            tracing::warn!("API_KEY not set, authentication disabled");
        }

        // Optional: port
        let port = match env::var("PORT") {
            Ok(s) if !s.is_empty() => s.parse().map_err(|_| ConfigError::InvalidPort(s))?,
            _ => DEFAULT_PORT,
        };

        Ok(Self {
            postgrest_url,
            backend_api_url,
            mcp_service_url,
            worker_service_url,
            api_key,
            port,
        })
    }
}

/// Read a backend base URL from the environment, falling back to its default.
fn backend_url_var(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let value = env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string());
    Url::parse(&value).map_err(|_| ConfigError::InvalidUrl(name, value.clone()))?;
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),

    #[error("invalid PORT: {0}")]
    InvalidPort(String),
}
