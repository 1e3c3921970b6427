// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Coinbase OAuth2 authorization-code flow.
//!
//! The `state` parameter is `<issued_at>.<nonce>.<tag>` where `tag` is an
//! HMAC-SHA256 over `<issued_at>.<nonce>.<user_id>` keyed with
//! `COINBASE_OAUTH_STATE_SECRET` (or a per-process random key). The user id
//! is not carried in the state; the callback recomputes the tag for the
//! session presenting it, so a state only completes the flow for the user
//! who started it. Issued nonces are held in a bounded LRU and consumed on
//! first use.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use lru::LruCache;
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};
use url::Url;

use super::{http_client, ProviderError};
use crate::config::CoinbaseConfig;

type HmacSha256 = Hmac<Sha256>;

const PROVIDER: &str = "Coinbase OAuth";

/// Scopes requested from Coinbase.
pub const OAUTH_SCOPE: &str = "exchange:accounts:read offline_access";

/// How long an issued `state` stays acceptable.
const STATE_MAX_AGE_SECS: i64 = 600;

/// Tolerated clock skew for `state` timestamps from the future.
const STATE_CLOCK_SKEW_SECS: i64 = 60;

/// Random key length when no state secret is configured.
const STATE_KEY_LEN: usize = 32;

/// Random bytes in a state nonce.
const NONCE_LEN: usize = 16;

/// Most OAuth flows awaiting their callback at once.
const PENDING_STATE_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Coinbase OAuth is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Invalid Coinbase authorize URL: {0}")]
    InvalidAuthorizeUrl(String),

    #[error("OAuth state is invalid")]
    InvalidState,

    #[error("OAuth state has expired")]
    ExpiredState,

    #[error("OAuth state was already used")]
    ReplayedState,

    #[error("Coinbase token exchange failed: {0}")]
    TokenExchange(String),
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Clone)]
pub struct CoinbaseOAuth {
    auth_url: String,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    state_key: Vec<u8>,
    /// nonce -> issued_at for states not yet redeemed
    pending: Arc<Mutex<LruCache<String, i64>>>,
    http: Client,
}

impl std::fmt::Debug for CoinbaseOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseOAuth")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

impl CoinbaseOAuth {
    pub fn new(config: &CoinbaseConfig, redirect_uri: String) -> Result<Self, ProviderError> {
        let state_key = match &config.oauth_state_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                warn!("COINBASE_OAUTH_STATE_SECRET not set; using a per-process random key");
                let key: [u8; STATE_KEY_LEN] = rand::random();
                key.to_vec()
            }
        };
        let capacity = NonZeroUsize::new(PENDING_STATE_CAPACITY).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri,
            state_key,
            pending: Arc::new(Mutex::new(LruCache::new(capacity))),
            http: http_client(PROVIDER)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some()
    }

    /// Build the authorize URL with a `state` issued to `user_id`.
    ///
    /// Returns the URL and the `state` embedded in it.
    pub fn authorize_url(&self, user_id: &str) -> Result<(Url, String), OAuthError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(OAuthError::NotConfigured("COINBASE_CLIENT_ID"))?;
        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| OAuthError::InvalidAuthorizeUrl(e.to_string()))?;
        let state = self.issue_state_at(user_id, Utc::now().timestamp())?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", &state)
            .append_pair("scope", OAUTH_SCOPE);

        Ok((url, state))
    }

    /// Redeem a `state` returned on the callback for `user_id`.
    ///
    /// Succeeds at most once per issued state.
    pub fn verify_state(&self, state: &str, user_id: &str) -> Result<(), OAuthError> {
        self.verify_state_at(state, user_id, Utc::now().timestamp())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokens, OAuthError> {
        let client_id = self
            .client_id
            .clone()
            .ok_or(OAuthError::NotConfigured("COINBASE_CLIENT_ID"))?;
        let client_secret = self
            .client_secret
            .clone()
            .ok_or(OAuthError::NotConfigured("COINBASE_CLIENT_SECRET"))?;

        let mut form = HashMap::new();
        form.insert("grant_type", "authorization_code".to_string());
        form.insert("code", code.to_string());
        form.insert("client_id", client_id);
        form.insert("client_secret", client_secret);
        form.insert("redirect_uri", self.redirect_uri.clone());

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchange(format!(
                "token request returned {status}: {body}"
            )));
        }

        let tokens: OAuthTokens = response
            .json()
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("invalid token response: {e}")))?;

        if tokens.access_token.trim().is_empty() {
            return Err(OAuthError::TokenExchange(
                "token response did not include access_token".to_string(),
            ));
        }

        info!(
            expires_in = ?tokens.expires_in,
            scope = ?tokens.scope,
            has_refresh_token = tokens.refresh_token.is_some(),
            "Coinbase OAuth tokens issued"
        );
        Ok(tokens)
    }

    fn issue_state_at(&self, user_id: &str, issued_at: i64) -> Result<String, OAuthError> {
        let nonce: [u8; NONCE_LEN] = rand::random();
        let nonce = Base64UrlUnpadded::encode_string(&nonce);
        let payload = format!("{issued_at}.{nonce}");

        let mac = self.state_mac(&payload, user_id)?;
        let tag = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
        self.pending
            .lock()
            .map_err(|_| OAuthError::InvalidState)?
            .put(nonce, issued_at);
        Ok(format!("{payload}.{tag}"))
    }

    fn verify_state_at(&self, state: &str, user_id: &str, now: i64) -> Result<(), OAuthError> {
        let (payload, tag) = state.rsplit_once('.').ok_or(OAuthError::InvalidState)?;
        let tag = Base64UrlUnpadded::decode_vec(tag).map_err(|_| OAuthError::InvalidState)?;

        self.state_mac(payload, user_id)?
            .verify_slice(&tag)
            .map_err(|_| OAuthError::InvalidState)?;

        let (issued_at, nonce) = payload.split_once('.').ok_or(OAuthError::InvalidState)?;
        let issued_at: i64 = issued_at.parse().map_err(|_| OAuthError::InvalidState)?;
        if now - issued_at > STATE_MAX_AGE_SECS || issued_at - now > STATE_CLOCK_SKEW_SECS {
            return Err(OAuthError::ExpiredState);
        }

        self.pending
            .lock()
            .map_err(|_| OAuthError::InvalidState)?
            .pop(nonce)
            .map(|_| ())
            .ok_or(OAuthError::ReplayedState)
    }

    fn state_mac(&self, payload: &str, user_id: &str) -> Result<HmacSha256, OAuthError> {
        // HMAC accepts keys of any length.
        let mut mac =
            HmacSha256::new_from_slice(&self.state_key).map_err(|_| OAuthError::InvalidState)?;
        mac.update(payload.as_bytes());
        mac.update(b".");
        mac.update(user_id.as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth(client_id: Option<&str>) -> CoinbaseOAuth {
        let config = CoinbaseConfig {
            client_id: client_id.map(str::to_string),
            client_secret: Some("shh".to_string()),
            oauth_state_secret: Some("state-secret".to_string()),
            ..CoinbaseConfig::default()
        };
        CoinbaseOAuth::new(
            &config,
            "https://folio.example.com/api/cb/oauth2/callback".to_string(),
        )
        .unwrap()
    }

    fn query_values(url: &Url, key: &str) -> Vec<String> {
        url.query_pairs()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .collect()
    }

    const USER: &str = "8d0f5a52-6f5e-4c1e-9a51-1f2b3c4d5e6f";

    #[test]
    fn authorize_url_contains_each_parameter_once() {
        let (url, state) = oauth(Some("client-1")).authorize_url(USER).unwrap();
        assert_eq!(url.host_str(), Some("login.coinbase.com"));
        assert_eq!(url.path(), "/oauth2/auth");

        for (key, expected) in [
            ("response_type", "code"),
            ("client_id", "client-1"),
            ("redirect_uri", "https://folio.example.com/api/cb/oauth2/callback"),
            ("scope", OAUTH_SCOPE),
        ] {
            assert_eq!(query_values(&url, key), vec![expected.to_string()], "{key}");
        }
        assert_eq!(query_values(&url, "state"), vec![state]);
    }

    #[test]
    fn every_call_issues_a_distinct_state() {
        let oauth = oauth(Some("client-1"));
        let states: std::collections::HashSet<String> = (0..50)
            .map(|_| oauth.authorize_url(USER).unwrap().1)
            .collect();
        assert_eq!(states.len(), 50);
    }

    #[test]
    fn authorize_url_requires_client_id() {
        assert!(matches!(
            oauth(None).authorize_url(USER),
            Err(OAuthError::NotConfigured("COINBASE_CLIENT_ID"))
        ));
    }

    #[test]
    fn issued_state_verifies_once() {
        let oauth = oauth(Some("client-1"));
        let (_, state) = oauth.authorize_url(USER).unwrap();
        assert!(oauth.verify_state(&state, USER).is_ok());
        assert!(matches!(
            oauth.verify_state(&state, USER),
            Err(OAuthError::ReplayedState)
        ));
    }

    #[test]
    fn state_is_bound_to_the_issuing_user() {
        let oauth = oauth(Some("client-1"));
        let (_, state) = oauth.authorize_url(USER).unwrap();
        assert!(matches!(
            oauth.verify_state(&state, "someone-else"),
            Err(OAuthError::InvalidState)
        ));
        // A rejected attempt does not burn the state for its owner.
        assert!(oauth.verify_state(&state, USER).is_ok());
    }

    #[test]
    fn tampered_or_foreign_state_is_rejected() {
        let oauth = oauth(Some("client-1"));
        let state = oauth.issue_state_at(USER, 1_700_000_000).unwrap();

        let tampered = state.replacen("1700000000", "1700000001", 1);
        assert!(matches!(
            oauth.verify_state_at(&tampered, USER, 1_700_000_010),
            Err(OAuthError::InvalidState)
        ));
        assert!(matches!(
            oauth.verify_state_at("not-a-state", USER, 1_700_000_010),
            Err(OAuthError::InvalidState)
        ));

        let mut other = oauth.clone();
        other.state_key = b"different".to_vec();
        assert!(matches!(
            other.verify_state_at(&state, USER, 1_700_000_010),
            Err(OAuthError::InvalidState)
        ));
    }

    #[test]
    fn signed_state_from_another_process_is_not_redeemable() {
        let issuer = oauth(Some("client-1"));
        let state = issuer.issue_state_at(USER, 1_700_000_000).unwrap();

        // Same secret, but the nonce was never issued here.
        let restarted = oauth(Some("client-1"));
        assert!(matches!(
            restarted.verify_state_at(&state, USER, 1_700_000_010),
            Err(OAuthError::ReplayedState)
        ));
    }

    #[test]
    fn old_state_expires() {
        let oauth = oauth(Some("client-1"));
        let fresh = oauth.issue_state_at(USER, 1_700_000_000).unwrap();
        assert!(oauth.verify_state_at(&fresh, USER, 1_700_000_000 + 599).is_ok());

        let stale = oauth.issue_state_at(USER, 1_700_000_000).unwrap();
        assert!(matches!(
            oauth.verify_state_at(&stale, USER, 1_700_000_000 + 601),
            Err(OAuthError::ExpiredState)
        ));
    }

    #[tokio::test]
    async fn exchange_code_posts_authorization_code_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "cb_access",
                "refresh_token": "cb_refresh",
                "expires_in": 3600,
                "scope": OAUTH_SCOPE,
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut oauth = oauth(Some("client-1"));
        oauth.token_url = format!("{}/oauth2/token", server.uri());

        let tokens = oauth.exchange_code("abc").await.unwrap();
        assert_eq!(tokens.access_token, "cb_access");
        assert_eq!(tokens.refresh_token.as_deref(), Some("cb_refresh"));
    }

    #[tokio::test]
    async fn exchange_code_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let mut oauth = oauth(Some("client-1"));
        oauth.token_url = format!("{}/oauth2/token", server.uri());

        let err = oauth.exchange_code("stale").await.unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
    }
}
