// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{utils::format_ether, U256};

/// EVM network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Tag reported in normalized balances
    pub tag: &'static str,
    /// Native asset ticker (18 decimals)
    pub native_symbol: &'static str,
}

/// Ethereum mainnet (queried through Infura).
pub const ETHEREUM_MAINNET: NetworkConfig = NetworkConfig {
    name: "Ethereum Mainnet",
    tag: crate::models::NETWORK_ETHEREUM,
    native_symbol: "ETH",
};

/// Convert a wei amount to decimal ETH.
///
/// Values above `f64` precision lose low-order digits; the result is never
/// negative.
pub fn wei_to_ether(wei: U256) -> f64 {
    format_ether(wei).parse().unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_ether_in_wei_is_one() {
        let wei = U256::from(0xde0b6b3a7640000u64);
        assert_eq!(wei_to_ether(wei), 1.0);
    }

    #[test]
    fn zero_wei_is_zero() {
        assert_eq!(wei_to_ether(U256::ZERO), 0.0);
    }

    #[test]
    fn conversion_matches_integer_division_by_ten_to_the_eighteenth() {
        for wei in [
            1u128,
            999_999_999u128,
            500_000_000_000_000_000,
            1_234_567_890_000_000_000,
            123_456_789_012_345_678_901_234,
        ] {
            let converted = wei_to_ether(U256::from(wei));
            let expected = wei as f64 / 1e18;
            assert!(converted >= 0.0);
            assert!(
                (converted - expected).abs() <= expected * 1e-12,
                "{wei}: {converted} != {expected}"
            );
        }
    }

    #[test]
    fn huge_balances_stay_finite() {
        assert!(wei_to_ether(U256::MAX).is_finite());
    }

    #[test]
    fn mainnet_reports_ethereum_tag() {
        assert_eq!(ETHEREUM_MAINNET.tag, "ethereum");
        assert_eq!(ETHEREUM_MAINNET.native_symbol, "ETH");
    }
}
