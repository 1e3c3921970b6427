// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CoinGecko `/simple/price` client.

use std::collections::HashMap;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
};
use tracing::{debug, warn};

use super::{read_json, ProviderError};
use crate::config::{CoinGeckoConfig, MissingPricePolicy, UPSTREAM_TIMEOUT};

pub const PROVIDER: &str = "CoinGecko";

/// CoinGecko asset id for Solana.
pub const SOLANA_ID: &str = "solana";

const VS_CURRENCY_USD: &str = "usd";

/// `{ "<coin id>": { "<vs currency>": price } }`; a price may be `null`.
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    api_url: String,
    missing_price: MissingPricePolicy,
    http: Client,
}

impl CoinGeckoClient {
    pub fn new(config: &CoinGeckoConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key).map_err(|e| ProviderError::NotConfigured {
                provider: PROVIDER,
                detail: format!("invalid API key format: {e}"),
            })?;
            headers.insert("x-cg-demo-api-key", value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            missing_price: config.missing_price,
            http,
        })
    }

    /// Current USD price of Solana.
    pub async fn solana_usd_price(&self) -> Result<f64, ProviderError> {
        self.usd_price(SOLANA_ID).await
    }

    /// Current USD price of the asset with CoinGecko id `coin_id`.
    pub async fn usd_price(&self, coin_id: &str) -> Result<f64, ProviderError> {
        let url = format!("{}/simple/price", self.api_url);
        debug!(%url, coin_id, "GET upstream");

        let response = self
            .http
            .get(&url)
            .query(&[("ids", coin_id), ("vs_currencies", VS_CURRENCY_USD)])
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let prices: SimplePriceResponse = read_json(PROVIDER, response).await?;
        self.extract_price(&prices, coin_id)
    }

    fn extract_price(&self, prices: &SimplePriceResponse, coin_id: &str) -> Result<f64, ProviderError> {
        let price = prices
            .get(coin_id)
            .and_then(|quotes| quotes.get(VS_CURRENCY_USD))
            .copied()
            .flatten();

        match (price, self.missing_price) {
            (Some(price), _) => Ok(price),
            (None, MissingPricePolicy::Zero) => {
                warn!(coin_id, "CoinGecko response has no USD price, reporting 0");
                Ok(0.0)
            }
            (None, MissingPricePolicy::Error) => Err(ProviderError::parse(
                PROVIDER,
                format!("no {VS_CURRENCY_USD} price for `{coin_id}`"),
            )),
        }
    }
}
