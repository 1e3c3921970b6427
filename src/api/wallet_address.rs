// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Normalized balance endpoints.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    auth::OptionalSession,
    blockchain::client::PROVIDER as INFURA_PROVIDER,
    error::ApiError,
    models::{AddressQuery, NormalizedBalance},
    providers::{coinbase::normalize_wallet_accounts, ProviderError},
    state::AppState,
};

/// Coinbase Wallet balances as [`NormalizedBalance`] entries (network `coinbase`).
#[utoipa::path(
    get,
    path = "/api/wallet-address/coinbase",
    tag = "Balances",
    security((), ("bearer" = [])),
    responses(
        (status = 200, description = "Positive Coinbase balances", body = Vec<NormalizedBalance>),
        (status = 500, description = "Coinbase request failed")
    )
)]
pub async fn coinbase_balances(
    OptionalSession(session): OptionalSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<NormalizedBalance>>, ApiError> {
    let user_id = session.as_ref().map(|s| s.user_id());
    let accounts = state.coinbase.wallet_accounts(user_id).await?;
    Ok(Json(normalize_wallet_accounts(&accounts)))
}

/// Native ETH balance of an address (network `ethereum`).
///
/// Always a one-element array.
#[utoipa::path(
    get,
    path = "/api/wallet-address/infura",
    tag = "Balances",
    params(AddressQuery),
    responses(
        (status = 200, description = "ETH balance in decimal units", body = Vec<NormalizedBalance>),
        (status = 400, description = "Missing or invalid address"),
        (status = 500, description = "Ethereum node request failed")
    )
)]
pub async fn infura_balance(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<Vec<NormalizedBalance>>, ApiError> {
    let address = query
        .address
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("address query parameter is required"))?;

    let client = state.ethereum.as_ref().ok_or(ProviderError::NotConfigured {
        provider: INFURA_PROVIDER,
        detail: "set INFURA_RPC_URL or INFURA_PROJECT_ID".to_string(),
    })?;

    let balance = client.native_balance(&address).await?;
    Ok(Json(vec![balance]))
}
