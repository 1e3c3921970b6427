// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ethereum JSON-RPC client (Infura) for native balance lookups.

use std::str::FromStr;

use alloy::{
    network::Ethereum,
    primitives::Address,
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};
use tracing::debug;

use super::types::{wei_to_ether, NetworkConfig, ETHEREUM_MAINNET};
use crate::models::NormalizedBalance;
use crate::providers::ProviderError;

pub const PROVIDER: &str = "Infura";

/// HTTP provider type for Ethereum (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Ethereum client bound to a single RPC endpoint.
pub struct EthereumClient {
    network: NetworkConfig,
    provider: HttpProvider,
}

impl std::fmt::Debug for EthereumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthereumClient")
            .field("network", &self.network.name)
            .finish_non_exhaustive()
    }
}

impl EthereumClient {
    /// Create a mainnet client for `rpc_url` (e.g. `https://mainnet.infura.io/v3/<key>`).
    pub fn new(rpc_url: &str) -> Result<Self, ProviderError> {
        let url: url::Url = rpc_url.parse().map_err(|e: url::ParseError| {
            ProviderError::NotConfigured {
                provider: PROVIDER,
                detail: format!("invalid RPC URL: {e}"),
            }
        })?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            network: ETHEREUM_MAINNET,
            provider,
        })
    }

    /// Native ETH balance of `address` at the latest block.
    pub async fn native_balance(&self, address: &str) -> Result<NormalizedBalance, ProviderError> {
        let addr = Address::from_str(address.trim())
            .map_err(|e| ProviderError::InvalidAddress(format!("`{address}`: {e}")))?;

        debug!(%addr, network = self.network.name, "eth_getBalance");

        let wei = self.provider.get_balance(addr).await.map_err(|e| {
            if e.is_deser_error() {
                ProviderError::parse(PROVIDER, e.to_string())
            } else {
                ProviderError::transport(PROVIDER, e)
            }
        })?;

        Ok(NormalizedBalance {
            symbol: self.network.native_symbol.to_string(),
            balance: wei_to_ether(wei),
            usd_value: None,
            network: self.network.tag.to_string(),
        })
    }
}
