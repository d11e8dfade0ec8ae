//! HTTP client for the Schwab cloud API.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use foliolens_core::errors::{Error, Result};

use crate::config::SchwabConfig;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// OAuth token response from the Schwab token endpoint.
///
/// Treated as an opaque credential by everything downstream; only
/// `access_token` is read back.
#[derive(Debug, Clone, Deserialize)]
pub struct SchwabToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Seam for the Schwab accounts fetch, so the adapter is testable with an
/// in-memory payload.
#[async_trait]
pub trait SchwabApi: Send + Sync {
    /// Fetch the raw accounts payload for the authenticated user.
    async fn fetch_accounts(&self) -> Result<serde_json::Value>;
}

/// HTTP client for the Schwab accounts API.
#[derive(Debug, Clone)]
pub struct SchwabApiClient {
    client: reqwest::Client,
    accounts_url: String,
    auth_header: HeaderValue,
}

impl SchwabApiClient {
    /// Create a client around an already-obtained access token.
    pub fn new(config: &SchwabConfig, access_token: &str) -> Result<Self> {
        let auth_header = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|e| Error::Auth(format!("Invalid access token format: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            accounts_url: config.accounts_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Form-encoded POST per the OAuth authorization-code grant; the caller
    /// stores the resulting token and constructs the client with it.
    pub async fn exchange_token(config: &SchwabConfig, auth_code: &str) -> Result<SchwabToken> {
        debug!("[SchwabApi] POST {}", config.token_url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", auth_code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let response = client
            .post(&config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Token request failed: {}", e)))?;

        let token: SchwabToken = parse_response(response).await?;
        info!("[SchwabApi] Token exchange succeeded");
        Ok(token)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, self.auth_header.clone());
        headers
    }
}

#[async_trait]
impl SchwabApi for SchwabApiClient {
    async fn fetch_accounts(&self) -> Result<serde_json::Value> {
        debug!("[SchwabApi] GET {}", self.accounts_url);

        let response = self
            .client
            .get(&self.accounts_url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Accounts request failed: {}", e)))?;

        parse_response(response).await
    }
}

/// Parse an HTTP response, mapping the status into the error taxonomy:
/// 401/403 are authentication failures, any other non-2xx a recoverable
/// network failure for that call only.
pub(crate) async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("Failed to read response: {}", e)))?;

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Auth(format!(
            "Rejected with {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )));
    }
    if !status.is_success() {
        return Err(Error::Network(format!(
            "API error {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )));
    }

    serde_json::from_str(&body).map_err(|e| Error::Parse(format!("{} - {}", e, body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SCHWAB_ACCOUNTS_URL, SCHWAB_TOKEN_URL};

    fn config() -> SchwabConfig {
        SchwabConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://example.test/callback".to_string(),
            token_url: SCHWAB_TOKEN_URL.to_string(),
            accounts_url: SCHWAB_ACCOUNTS_URL.to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(SchwabApiClient::new(&config(), "test-token").is_ok());
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = SchwabApiClient::new(&config(), "bad\ntoken");
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_token_deserialization_tolerates_missing_fields() {
        let token: SchwabToken =
            serde_json::from_str(r#"{"access_token": "abc123"}"#).unwrap();
        assert_eq!(token.access_token, "abc123");
        assert!(token.refresh_token.is_none());
        assert!(token.expires_in.is_none());
    }
}
