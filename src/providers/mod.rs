// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upstream provider clients.
//!
//! Each client wraps one third-party API and parses its payload into an
//! explicit schema at the boundary:
//!
//! - `coinbase` - Advanced Trade (exchange) and Wallet account lists
//! - `coinbase_oauth` - authorize URL, signed `state`, code exchange
//! - `coingecko` - simple-price USD quotes
//!
//! Ethereum balances go through [`crate::blockchain`].

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::config::UPSTREAM_TIMEOUT;

pub mod coinbase;
pub mod coinbase_oauth;
pub mod coingecko;

pub use coinbase::{CoinbaseClient, CoinbaseCredentials, ExchangeAccount, WalletAccount};
pub use coinbase_oauth::{CoinbaseOAuth, OAuthError};
pub use coingecko::CoinGeckoClient;

/// Longest upstream error body echoed back in error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} is not configured: {detail}")]
    NotConfigured {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} request failed: {detail}")]
    Transport {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    UpstreamHttp {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} response was invalid: {detail}")]
    UpstreamParse {
        provider: &'static str,
        detail: String,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl ProviderError {
    pub(crate) fn parse(provider: &'static str, detail: impl Into<String>) -> Self {
        ProviderError::UpstreamParse {
            provider,
            detail: detail.into(),
        }
    }

    pub(crate) fn transport(provider: &'static str, err: impl std::fmt::Display) -> Self {
        ProviderError::Transport {
            provider,
            detail: err.to_string(),
        }
    }
}

/// Build the shared upstream HTTP client.
pub(crate) fn http_client(provider: &'static str) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::transport(provider, format!("failed to build HTTP client: {e}")))
}

/// Check the status of `response` and decode its body as `T`.
///
/// Non-2xx statuses become `UpstreamHttp`; bodies that do not match `T`
/// become `UpstreamParse`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &'static str,
    response: Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::transport(provider, e))?;

    if !status.is_success() {
        return Err(ProviderError::UpstreamHttp {
            provider,
            status: status.as_u16(),
            body: truncate(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::parse(provider, e.to_string()))
}

/// Parse a decimal amount string from an upstream payload.
///
/// Negative, NaN and infinite values are rejected.
pub(crate) fn parse_amount(provider: &'static str, raw: &str) -> Result<f64, ProviderError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ProviderError::parse(provider, format!("`{raw}` is not a decimal amount")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ProviderError::parse(
            provider,
            format!("`{raw}` is not a non-negative amount"),
        ));
    }
    Ok(value)
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
