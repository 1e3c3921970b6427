// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures shared by the REST API. Types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation.
//!
//! ## Model Categories
//!
//! - **Balances**: the provider-independent [`NormalizedBalance`] shape
//! - **Admin**: the per-page-load [`AdminState`]
//! - **Verification**: OTP and email-code request/response bodies

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Balance Models
// =============================================================================

/// Network tag for balances read from Coinbase accounts.
pub const NETWORK_COINBASE: &str = "coinbase";

/// Network tag for balances read from the Ethereum chain.
pub const NETWORK_ETHEREUM: &str = "ethereum";

/// A balance converted to a common shape regardless of source provider.
///
/// `balance` is always in human-readable decimal units (ETH, BTC, ...),
/// never in chain base units.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBalance {
    /// Ticker symbol (e.g. `ETH`).
    pub symbol: String,
    /// Non-negative balance in decimal units.
    pub balance: f64,
    /// USD valuation when the provider reports one.
    pub usd_value: Option<f64>,
    /// Provider or chain tag (`coinbase`, `ethereum`).
    pub network: String,
}

/// Response of `GET /api/solana-price`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SolanaPriceResponse {
    /// SOL price in USD.
    pub price: f64,
}

/// Query string for `GET /api/wallet-address/infura`.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct AddressQuery {
    /// 0x-prefixed Ethereum address.
    pub address: Option<String>,
}

// =============================================================================
// Admin Models
// =============================================================================

/// Result of the admin gate for one page load.
///
/// Starts as `false/false` and is set once after the authorization store
/// has been consulted (or skipped because no session exists).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminState {
    pub is_admin: bool,
    pub checked_status: bool,
}

impl AdminState {
    /// State after a completed check.
    pub fn checked(is_admin: bool) -> Self {
        Self {
            is_admin,
            checked_status: true,
        }
    }
}

// =============================================================================
// Verification Models
// =============================================================================

/// Body of `POST /auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    /// Token hash from the emailed magic link / OTP.
    pub token: String,
}

/// Outcome of a verification step.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Body of `POST /auth/verification-code`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueCodeRequest {
    pub email: String,
}

/// Body of `POST /auth/verification-code/confirm`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmCodeRequest {
    pub email: String,
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalized_balance_serializes_camel_case() {
        let balance = NormalizedBalance {
            symbol: "ETH".to_string(),
            balance: 1.5,
            usd_value: None,
            network: NETWORK_ETHEREUM.to_string(),
        };
        let value = serde_json::to_value(&balance).unwrap();
        assert_eq!(
            value,
            json!({ "symbol": "ETH", "balance": 1.5, "usdValue": null, "network": "ethereum" })
        );
    }

    #[test]
    fn admin_state_defaults_to_unchecked() {
        let state = AdminState::default();
        assert!(!state.is_admin);
        assert!(!state.checked_status);

        let value = serde_json::to_value(AdminState::checked(true)).unwrap();
        assert_eq!(value, json!({ "isAdmin": true, "checkedStatus": true }));
    }

    #[test]
    fn verification_outcome_omits_error_on_success() {
        let value = serde_json::to_value(VerificationOutcome::ok()).unwrap();
        assert_eq!(value, json!({ "success": true }));

        let value = serde_json::to_value(VerificationOutcome::failed("expired")).unwrap();
        assert_eq!(value, json!({ "success": false, "error": "expired" }));
    }
}
