//! Environment-based provider configuration.

/// Schwab OAuth endpoints. The authorize/token pair lives on the developer
/// API host, the accounts endpoint on the trading host.
pub const SCHWAB_AUTH_URL: &str = "https://api.schwabapi.com/v1/oauth/authorize";
pub const SCHWAB_TOKEN_URL: &str = "https://api.schwabapi.com/v1/oauth/token";
pub const SCHWAB_ACCOUNTS_URL: &str = "https://api.schwab.com/v2/accounts";

/// Credentials and endpoints for the Schwab cloud API.
#[derive(Debug, Clone)]
pub struct SchwabConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub accounts_url: String,
}

impl SchwabConfig {
    /// Reads `SCHWAB_CLIENT_ID`, `SCHWAB_CLIENT_SECRET` and
    /// `SCHWAB_REDIRECT_URI`. Endpoint URLs are fixed; only credentials come
    /// from the environment.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self {
            client_id: var("SCHWAB_CLIENT_ID"),
            client_secret: var("SCHWAB_CLIENT_SECRET"),
            redirect_uri: var("SCHWAB_REDIRECT_URI"),
            token_url: SCHWAB_TOKEN_URL.to_string(),
            accounts_url: SCHWAB_ACCOUNTS_URL.to_string(),
        }
    }

    /// The URL a user visits to grant read access. The resulting code is
    /// exchanged via [`crate::schwab::SchwabApiClient::exchange_token`].
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope=readonly",
            SCHWAB_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
        )
    }
}

/// Connection settings for the local Client Portal gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Hard ceiling on position pages fetched per account. Termination must
    /// not depend on the gateway reporting totals correctly.
    pub max_position_pages: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4001,
            max_position_pages: 64,
        }
    }
}

impl GatewayConfig {
    /// Reads `IB_HOST` (default `127.0.0.1`) and `IB_GATEWAY_PORT`
    /// (default `4001`).
    pub fn from_env() -> Self {
        let defaults = GatewayConfig::default();
        let host = std::env::var("IB_HOST")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.host);
        let port = std::env::var("IB_GATEWAY_PORT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.port);
        Self {
            host,
            port,
            max_position_pages: defaults.max_position_pages,
        }
    }

    /// Gateway API root, e.g. `https://127.0.0.1:4001/v1/api`.
    pub fn base_url(&self) -> String {
        format!("https://{}:{}/v1/api", self.host, self.port)
    }
}
