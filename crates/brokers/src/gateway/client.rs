//! HTTP client for the local Client Portal gateway.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

use foliolens_core::errors::{Error, Result};
use foliolens_core::fx::FxError;

use super::models::{
    RawAccountSummary, RawAuthStatus, RawContractInfo, RawExchangeRate, RawGatewayAccount,
    RawSecurityDefinition,
};
use crate::config::GatewayConfig;
use crate::schwab::client::parse_response;

/// Default timeout for gateway requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Candidate account-listing paths, tried in order. Older gateway builds
/// only serve the second.
const ACCOUNT_PATHS: [&str; 2] = ["/portfolio/accounts", "/iserver/accounts"];

/// Seam over the gateway's REST surface, so the adapter is testable with an
/// in-memory stub.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Session status; the gate for everything else.
    async fn auth_status(&self) -> Result<RawAuthStatus>;

    /// Best-effort SSO validation ping.
    async fn validate_sso(&self) -> Result<()>;

    /// Account listing.
    async fn list_accounts(&self) -> Result<Vec<RawGatewayAccount>>;

    /// Per-account balance summary.
    async fn account_summary(&self, account_id: &str) -> Result<RawAccountSummary>;

    /// One page of positions. Records stay raw for per-record parsing.
    async fn positions_page(
        &self,
        account_id: &str,
        page: usize,
    ) -> Result<Vec<serde_json::Value>>;

    /// Contract metadata for one instrument.
    async fn contract_info(&self, conid: i64) -> Result<RawContractInfo>;

    /// Security definition for one instrument, when the gateway knows it.
    async fn security_definition(&self, conid: i64) -> Result<Option<RawSecurityDefinition>>;

    /// Spot quote: how many `target` units one `source` unit buys.
    async fn exchange_rate(&self, source: &str, target: &str) -> Result<Decimal>;
}

/// HTTP client for a locally running Client Portal gateway.
///
/// The gateway serves HTTPS with a self-signed certificate on localhost, so
/// certificate verification is disabled for this client only.
#[derive(Debug, Clone)]
pub struct GatewayApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayApiClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[Gateway] GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        parse_response(response).await
    }
}

#[async_trait]
impl GatewayApi for GatewayApiClient {
    async fn auth_status(&self) -> Result<RawAuthStatus> {
        let url = format!("{}/iserver/auth/status", self.base_url);
        debug!("[Gateway] POST {}", url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        parse_response(response).await
    }

    async fn validate_sso(&self) -> Result<()> {
        let url = format!("{}/sso/validate", self.base_url);
        debug!("[Gateway] GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Auth(format!("SSO validation rejected: {}", status)));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("SSO validation failed: {}", status)));
        }
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<RawGatewayAccount>> {
        let mut last_error = None;
        for path in ACCOUNT_PATHS {
            match self.get::<serde_json::Value>(path).await {
                Ok(value) => return Ok(accounts_from_value(value)),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    warn!("Account listing via {} failed: {}", path, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::Network("No account path available".to_string())))
    }

    async fn account_summary(&self, account_id: &str) -> Result<RawAccountSummary> {
        self.get(&format!("/portfolio/{}/summary", account_id)).await
    }

    async fn positions_page(
        &self,
        account_id: &str,
        page: usize,
    ) -> Result<Vec<serde_json::Value>> {
        self.get(&format!("/portfolio/{}/positions/{}", account_id, page))
            .await
    }

    async fn contract_info(&self, conid: i64) -> Result<RawContractInfo> {
        self.get(&format!("/iserver/contract/{}/info", conid)).await
    }

    async fn security_definition(&self, conid: i64) -> Result<Option<RawSecurityDefinition>> {
        let definitions: Vec<RawSecurityDefinition> =
            self.get(&format!("/iserver/secdef/info?conid={}", conid)).await?;
        Ok(definitions.into_iter().next())
    }

    async fn exchange_rate(&self, source: &str, target: &str) -> Result<Decimal> {
        let response: RawExchangeRate = self
            .get(&format!(
                "/iserver/exchangerate?source={}&target={}",
                urlencoding::encode(source),
                urlencoding::encode(target)
            ))
            .await?;

        response
            .rate
            .filter(|rate| rate.is_finite())
            .and_then(Decimal::from_f64)
            .ok_or_else(|| {
                Error::Fx(FxError::RateNotFound(format!("{}/{}", source, target)))
            })
    }
}

/// Converts either account-listing shape into account records: a bare array
/// of objects (`/portfolio/accounts`) or `{"accounts": [...]}` whose entries
/// may be plain id strings (`/iserver/accounts`).
fn accounts_from_value(value: serde_json::Value) -> Vec<RawGatewayAccount> {
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut map) => match map.remove("accounts") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| match entry {
            serde_json::Value::String(id) => Some(RawGatewayAccount {
                id: Some(id),
                ..Default::default()
            }),
            entry => match serde_json::from_value(entry) {
                Ok(account) => Some(account),
                Err(e) => {
                    warn!("Skipping malformed gateway account record: {}", e);
                    None
                }
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::models::RawSummaryValue;
    use crate::raw::RawNumber;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        assert!(GatewayApiClient::new(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_accounts_from_portfolio_shape() {
        let accounts = accounts_from_value(json!([
            {"id": "U1234567", "accountTitle": "Margin", "type": "Margin", "currency": "USD"}
        ]));
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id.as_deref(), Some("U1234567"));
        assert_eq!(accounts[0].account_type.as_deref(), Some("Margin"));
    }

    #[test]
    fn test_accounts_from_iserver_shape() {
        let accounts = accounts_from_value(json!({
            "accounts": ["U1234567", {"accountId": "U7654321", "accountAlias": "ISA pot"}],
            "selectedAccount": "U1234567"
        }));
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id.as_deref(), Some("U1234567"));
        assert_eq!(accounts[1].id.as_deref(), Some("U7654321"));
        assert_eq!(accounts[1].account_alias.as_deref(), Some("ISA pot"));
    }

    #[test]
    fn test_summary_value_spellings() {
        let value: RawSummaryValue =
            serde_json::from_value(json!({"amount": 25876.45, "currency": "USD"})).unwrap();
        assert!(value.amount.is_some());

        // Older builds nest {"value": "...", "currency": "..."}.
        let value: RawSummaryValue =
            serde_json::from_value(json!({"value": "25876.45", "currency": "USD"})).unwrap();
        assert_eq!(
            value.amount.as_ref().and_then(RawNumber::as_f64),
            Some(25876.45)
        );
    }
}
