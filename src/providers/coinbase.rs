// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Coinbase account clients.
//!
//! Two APIs are read with the same OAuth bearer token:
//!
//! - Advanced Trade (`/api/v3/brokerage/accounts`), reported as "exchange"
//!   balances with an `available_balance.value` decimal string
//! - Wallet v2 (`/v2/accounts`), with a `balance.amount` decimal string

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::{http_client, parse_amount, read_json, ProviderError};
use crate::config::CoinbaseConfig;
use crate::models::{NormalizedBalance, NETWORK_COINBASE};

pub const EXCHANGE_PROVIDER: &str = "Coinbase Exchange";
pub const WALLET_PROVIDER: &str = "Coinbase Wallet";

/// API version pinned for the Wallet v2 API.
const CB_VERSION: &str = "2024-01-01";

// =============================================================================
// Upstream Schemas
// =============================================================================

/// Amount object used by the Advanced Trade API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ExchangeAmount {
    /// Decimal string.
    pub value: String,
    pub currency: String,
}

/// One Advanced Trade account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ExchangeAccount {
    pub uuid: String,
    pub name: String,
    pub currency: String,
    pub available_balance: ExchangeAmount,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold: Option<ExchangeAmount>,
    /// Fields not modelled above, passed through unchanged.
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExchangeAccount {
    /// Available balance in decimal units.
    pub fn available(&self) -> Result<f64, ProviderError> {
        parse_amount(EXCHANGE_PROVIDER, &self.available_balance.value)
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeAccountsResponse {
    accounts: Vec<ExchangeAccount>,
}

/// Amount object used by the Wallet v2 API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct WalletAmount {
    /// Decimal string.
    pub amount: String,
    pub currency: String,
}

/// Currency descriptor embedded in Wallet v2 accounts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct WalletCurrency {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One Wallet v2 account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct WalletAccount {
    pub id: String,
    pub name: String,
    pub currency: WalletCurrency,
    pub balance: WalletAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_balance: Option<WalletAmount>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    /// Fields not modelled above, passed through unchanged.
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WalletAccount {
    /// Balance in decimal units.
    pub fn amount(&self) -> Result<f64, ProviderError> {
        parse_amount(WALLET_PROVIDER, &self.balance.amount)
    }

    /// USD valuation, present only when Coinbase reports the native balance in USD.
    pub fn usd_value(&self) -> Result<Option<f64>, ProviderError> {
        match &self.native_balance {
            Some(native) if native.currency.eq_ignore_ascii_case("USD") => {
                parse_amount(WALLET_PROVIDER, &native.amount).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WalletAccountsResponse {
    data: Vec<WalletAccount>,
}

// =============================================================================
// Credentials
// =============================================================================

/// Bearer tokens used for Coinbase API calls.
///
/// Tokens obtained through the OAuth callback belong to the Supabase user
/// who completed the flow and are only used for that user's requests. The
/// static `COINBASE_ACCESS_TOKEN` is the fallback for everyone else.
#[derive(Clone, Default)]
pub struct CoinbaseCredentials {
    static_token: Option<String>,
    /// user id -> OAuth access token
    oauth_tokens: Arc<RwLock<HashMap<String, String>>>,
}

impl CoinbaseCredentials {
    pub fn new(static_token: Option<String>) -> Self {
        Self {
            static_token,
            oauth_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store (or replace) the OAuth-issued token for `user_id`.
    pub async fn set_oauth_token(&self, user_id: &str, token: String) {
        self.oauth_tokens
            .write()
            .await
            .insert(user_id.to_string(), token);
    }

    /// Bearer token for a request made by `user_id` (or anonymously).
    pub async fn current(&self, user_id: Option<&str>) -> Option<String> {
        if let Some(user_id) = user_id {
            if let Some(token) = self.oauth_tokens.read().await.get(user_id) {
                return Some(token.clone());
            }
        }
        self.static_token.clone()
    }
}

impl std::fmt::Debug for CoinbaseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseCredentials")
            .field("static_token", &self.static_token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct CoinbaseClient {
    exchange_api_url: String,
    wallet_api_url: String,
    credentials: CoinbaseCredentials,
    http: Client,
}

impl CoinbaseClient {
    pub fn new(
        config: &CoinbaseConfig,
        credentials: CoinbaseCredentials,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            exchange_api_url: config.exchange_api_url.trim_end_matches('/').to_string(),
            wallet_api_url: config.wallet_api_url.trim_end_matches('/').to_string(),
            credentials,
            http: http_client(EXCHANGE_PROVIDER)?,
        })
    }

    pub fn credentials(&self) -> &CoinbaseCredentials {
        &self.credentials
    }

    /// Fetch all Advanced Trade accounts (unfiltered) visible to `user_id`.
    pub async fn exchange_accounts(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<ExchangeAccount>, ProviderError> {
        let url = format!("{}/accounts", self.exchange_api_url);
        let response: ExchangeAccountsResponse =
            self.get_json(EXCHANGE_PROVIDER, &url, user_id).await?;
        info!(
            accounts = response.accounts.len(),
            "Coinbase exchange accounts fetched"
        );
        Ok(response.accounts)
    }

    /// Fetch all Wallet v2 accounts (unfiltered) visible to `user_id`.
    pub async fn wallet_accounts(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<WalletAccount>, ProviderError> {
        let url = format!("{}/accounts", self.wallet_api_url);
        let response: WalletAccountsResponse =
            self.get_json(WALLET_PROVIDER, &url, user_id).await?;
        info!(accounts = response.data.len(), "Coinbase wallet accounts fetched");
        Ok(response.data)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        provider: &'static str,
        url: &str,
        user_id: Option<&str>,
    ) -> Result<T, ProviderError> {
        let token = self
            .credentials
            .current(user_id)
            .await
            .ok_or_else(|| ProviderError::NotConfigured {
                provider,
                detail: "no access token; complete the OAuth flow or set COINBASE_ACCESS_TOKEN"
                    .to_string(),
            })?;

        debug!(%url, provider, "GET upstream");
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("CB-VERSION", CB_VERSION)
            .send()
            .await
            .map_err(|e| ProviderError::transport(provider, e))?;

        read_json(provider, response).await
    }
}

// =============================================================================
// Filtering & Normalization
// =============================================================================

/// Keep only accounts with a strictly positive available balance.
///
/// Accounts whose amount does not parse are dropped with a warning.
pub fn positive_exchange_accounts(accounts: Vec<ExchangeAccount>) -> Vec<ExchangeAccount> {
    accounts
        .into_iter()
        .filter(|account| match account.available() {
            Ok(value) => value > 0.0,
            Err(e) => {
                warn!(account = %account.uuid, error = %e, "skipping exchange account");
                false
            }
        })
        .collect()
}

/// Keep only accounts with a strictly positive balance.
///
/// Accounts whose amount does not parse are dropped with a warning.
pub fn positive_wallet_accounts(accounts: Vec<WalletAccount>) -> Vec<WalletAccount> {
    accounts
        .into_iter()
        .filter(|account| positive_wallet_amount(account).is_some())
        .collect()
}

/// Map positive wallet accounts to [`NormalizedBalance`] entries.
pub fn normalize_wallet_accounts(accounts: &[WalletAccount]) -> Vec<NormalizedBalance> {
    accounts
        .iter()
        .filter_map(|account| {
            let balance = positive_wallet_amount(account)?;
            let usd_value = account.usd_value().unwrap_or_else(|e| {
                warn!(account = %account.id, error = %e, "ignoring unparseable USD value");
                None
            });
            Some(NormalizedBalance {
                symbol: account.balance.currency.clone(),
                balance,
                usd_value,
                network: NETWORK_COINBASE.to_string(),
            })
        })
        .collect()
}

fn positive_wallet_amount(account: &WalletAccount) -> Option<f64> {
    match account.amount() {
        Ok(value) if value > 0.0 => Some(value),
        Ok(_) => None,
        Err(e) => {
            warn!(account = %account.id, error = %e, "skipping wallet account");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn exchange_account(currency: &str, value: &str) -> serde_json::Value {
        json!({
            "uuid": format!("uuid-{currency}"),
            "name": format!("{currency} Wallet"),
            "currency": currency,
            "available_balance": { "value": value, "currency": currency },
            "default": false,
            "active": true,
            "type": "ACCOUNT_TYPE_CRYPTO",
            "ready": true,
            "hold": { "value": "0", "currency": currency }
        })
    }

    fn wallet_account(code: &str, amount: &str, usd: Option<&str>) -> serde_json::Value {
        let mut account = json!({
            "id": format!("id-{code}"),
            "name": format!("{code} Wallet"),
            "primary": true,
            "type": "wallet",
            "currency": { "code": code, "name": code },
            "balance": { "amount": amount, "currency": code }
        });
        if let Some(usd) = usd {
            account["native_balance"] = json!({ "amount": usd, "currency": "USD" });
        }
        account
    }

    fn client_for(server: &MockServer, token: Option<&str>) -> CoinbaseClient {
        let config = CoinbaseConfig {
            exchange_api_url: format!("{}/api/v3/brokerage", server.uri()),
            wallet_api_url: format!("{}/v2", server.uri()),
            ..CoinbaseConfig::default()
        };
        CoinbaseClient::new(&config, CoinbaseCredentials::new(token.map(str::to_string))).unwrap()
    }

    #[test]
    fn exchange_filter_keeps_strictly_positive_balances() {
        let accounts: Vec<ExchangeAccount> = serde_json::from_value(json!([
            exchange_account("BTC", "0.25"),
            exchange_account("ETH", "0"),
            exchange_account("SOL", "0.0000"),
            exchange_account("USDC", "10"),
        ]))
        .unwrap();

        let kept = positive_exchange_accounts(accounts);
        let currencies: Vec<_> = kept.iter().map(|a| a.currency.as_str()).collect();
        assert_eq!(currencies, vec!["BTC", "USDC"]);
        assert!(kept.iter().all(|a| a.available().unwrap() > 0.0));
    }

    #[test]
    fn exchange_filter_drops_negative_and_garbage_amounts() {
        let accounts: Vec<ExchangeAccount> = serde_json::from_value(json!([
            exchange_account("BTC", "0.5"),
            exchange_account("USD", "-0.01"),
            exchange_account("DOGE", "lots"),
            exchange_account("ETH", "2"),
        ]))
        .unwrap();

        let kept = positive_exchange_accounts(accounts);
        let currencies: Vec<_> = kept.iter().map(|a| a.currency.as_str()).collect();
        assert_eq!(currencies, vec!["BTC", "ETH"]);
    }

    #[test]
    fn wallet_normalization_skips_bad_amounts_and_keeps_the_rest() {
        let accounts: Vec<WalletAccount> = serde_json::from_value(json!([
            wallet_account("SOL", "-3", None),
            wallet_account("BTC", "n/a", Some("10")),
            wallet_account("ETH", "1", Some("not-a-number")),
            wallet_account("ADA", "50", Some("20.5")),
        ]))
        .unwrap();

        assert_eq!(positive_wallet_accounts(accounts.clone()).len(), 2);

        let balances = normalize_wallet_accounts(&accounts);
        let summary: Vec<_> = balances
            .iter()
            .map(|b| (b.symbol.as_str(), b.balance, b.usd_value))
            .collect();
        assert_eq!(summary, vec![("ETH", 1.0, None), ("ADA", 50.0, Some(20.5))]);
    }

    #[test]
    fn wallet_filter_keeps_strictly_positive_balances() {
        let accounts: Vec<WalletAccount> = serde_json::from_value(json!([
            wallet_account("BTC", "0.00000000", None),
            wallet_account("ETH", "1.5", Some("4500.00")),
        ]))
        .unwrap();

        let kept = positive_wallet_accounts(accounts);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].currency.code, "ETH");
    }

    #[test]
    fn wallet_accounts_normalize_with_usd_value() {
        let accounts: Vec<WalletAccount> = serde_json::from_value(json!([
            wallet_account("ETH", "1.5", Some("4500.00")),
            wallet_account("DOGE", "100", None),
            wallet_account("BTC", "0", Some("0.00")),
        ]))
        .unwrap();

        let balances = normalize_wallet_accounts(&accounts);
        assert_eq!(
            balances,
            vec![
                NormalizedBalance {
                    symbol: "ETH".to_string(),
                    balance: 1.5,
                    usd_value: Some(4500.0),
                    network: "coinbase".to_string(),
                },
                NormalizedBalance {
                    symbol: "DOGE".to_string(),
                    balance: 100.0,
                    usd_value: None,
                    network: "coinbase".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unknown_upstream_fields_round_trip() {
        let mut raw = exchange_account("BTC", "1");
        raw["retail_portfolio_id"] = json!("portfolio-1");
        let account: ExchangeAccount = serde_json::from_value(raw).unwrap();
        assert_eq!(account.extra["retail_portfolio_id"], "portfolio-1");

        let out = serde_json::to_value(&account).unwrap();
        assert_eq!(out["retail_portfolio_id"], "portfolio-1");
        assert_eq!(out["available_balance"]["value"], "1");
    }

    #[test]
    fn non_usd_native_balance_is_not_a_usd_value() {
        let account: WalletAccount = serde_json::from_value(json!({
            "id": "1",
            "name": "ETH Wallet",
            "currency": { "code": "ETH" },
            "balance": { "amount": "1", "currency": "ETH" },
            "native_balance": { "amount": "2900", "currency": "EUR" }
        }))
        .unwrap();
        assert_eq!(account.usd_value().unwrap(), None);
    }

    #[tokio::test]
    async fn oauth_tokens_are_scoped_to_their_user() {
        let credentials = CoinbaseCredentials::new(Some("static".to_string()));
        assert_eq!(credentials.current(Some("alice")).await.as_deref(), Some("static"));

        credentials.set_oauth_token("alice", "alice-oauth".to_string()).await;
        assert_eq!(
            credentials.current(Some("alice")).await.as_deref(),
            Some("alice-oauth")
        );
        assert_eq!(credentials.current(Some("bob")).await.as_deref(), Some("static"));
        assert_eq!(credentials.current(None).await.as_deref(), Some("static"));
    }

    #[tokio::test]
    async fn anonymous_callers_never_see_oauth_tokens() {
        let credentials = CoinbaseCredentials::new(None);
        credentials.set_oauth_token("alice", "alice-oauth".to_string()).await;
        assert_eq!(credentials.current(None).await, None);
    }

    #[tokio::test]
    async fn exchange_accounts_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/accounts"))
            .and(header("authorization", "Bearer tok_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accounts": [exchange_account("BTC", "0.1")],
                "has_next": false,
                "cursor": "",
                "size": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let accounts = client_for(&server, Some("tok_123"))
            .exchange_accounts(None)
            .await
            .unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].available_balance.value, "0.1");
    }

    #[tokio::test]
    async fn wallet_accounts_surfaces_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/accounts"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_token"))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("expired"))
            .wallet_accounts(None)
            .await
            .unwrap_err();
        match err {
            ProviderError::UpstreamHttp { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid_token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn wallet_accounts_rejects_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accounts": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("tok"))
            .wallet_accounts(None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UpstreamParse { .. }));
    }

    #[tokio::test]
    async fn missing_token_is_not_configured() {
        let server = MockServer::start().await;
        let err = client_for(&server, None)
            .exchange_accounts(None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
    }
}
