// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Coinbase balance and OAuth endpoints.

use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    auth::{OptionalSession, RequireSession},
    error::ApiError,
    providers::{
        coinbase::{positive_exchange_accounts, positive_wallet_accounts},
        ExchangeAccount, WalletAccount,
    },
    state::AppState,
};

/// Query string Coinbase appends to the OAuth redirect.
#[derive(Debug, Deserialize, IntoParams)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied access
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// List Coinbase Advanced Trade accounts with a positive available balance.
///
/// Signed-in users who connected Coinbase see their own accounts; everyone
/// else is served with the configured `COINBASE_ACCESS_TOKEN`, if any.
#[utoipa::path(
    get,
    path = "/api/cb/exchange/balances",
    tag = "Coinbase",
    security((), ("bearer" = [])),
    responses(
        (status = 200, description = "Accounts with a positive available balance", body = Vec<ExchangeAccount>),
        (status = 500, description = "Coinbase request failed")
    )
)]
pub async fn exchange_balances(
    OptionalSession(session): OptionalSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExchangeAccount>>, ApiError> {
    let user_id = session.as_ref().map(|s| s.user_id());
    let accounts = state.coinbase.exchange_accounts(user_id).await?;
    Ok(Json(positive_exchange_accounts(accounts)))
}

/// List Coinbase Wallet accounts with a positive balance.
#[utoipa::path(
    get,
    path = "/api/cb/wallet/balances",
    tag = "Coinbase",
    security((), ("bearer" = [])),
    responses(
        (status = 200, description = "Accounts with a positive balance", body = Vec<WalletAccount>),
        (status = 500, description = "Coinbase request failed")
    )
)]
pub async fn wallet_balances(
    OptionalSession(session): OptionalSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<WalletAccount>>, ApiError> {
    let user_id = session.as_ref().map(|s| s.user_id());
    let accounts = state.coinbase.wallet_accounts(user_id).await?;
    Ok(Json(positive_wallet_accounts(accounts)))
}

/// Start the Coinbase OAuth flow for the signed-in user.
///
/// Redirects (302) to the Coinbase authorize page with a fresh `state`
/// bound to the caller.
#[utoipa::path(
    get,
    path = "/api/cb/oauth2/start",
    tag = "Coinbase",
    security(("bearer" = [])),
    responses(
        (status = 302, description = "Redirect to Coinbase"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "OAuth client not configured")
    )
)]
pub async fn oauth_start(
    RequireSession(session): RequireSession,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let (url, _state) = state.coinbase_oauth.authorize_url(session.user_id())?;
    Ok((StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response())
}

/// Complete the Coinbase OAuth flow.
///
/// Redeems `state` for the signed-in user, exchanges `code` for an access
/// token used for that user's Coinbase balance requests, then redirects to
/// the application.
#[utoipa::path(
    get,
    path = "/api/cb/oauth2/callback",
    tag = "Coinbase",
    security(("bearer" = [])),
    params(OAuthCallbackQuery),
    responses(
        (status = 302, description = "Token stored; redirect to the application"),
        (status = 400, description = "Missing code, bad or reused state, or access denied"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "Token exchange failed")
    )
)]
pub async fn oauth_callback(
    RequireSession(session): RequireSession,
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Response, ApiError> {
    if let Some(error) = query.error {
        let detail = query.error_description.unwrap_or_default();
        return Err(ApiError::bad_request(format!(
            "Coinbase authorization failed: {error} {detail}"
        ).trim_end().to_string()));
    }

    let oauth_state = query
        .state
        .ok_or_else(|| ApiError::bad_request("state query parameter is required"))?;
    state
        .coinbase_oauth
        .verify_state(&oauth_state, session.user_id())?;

    let code = query
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("code query parameter is required"))?;

    let tokens = state.coinbase_oauth.exchange_code(&code).await?;
    state
        .coinbase
        .credentials()
        .set_oauth_token(session.user_id(), tokens.access_token)
        .await;
    info!(user_id = %session.user_id(), "Coinbase account connected");

    Ok((
        StatusCode::FOUND,
        [(LOCATION, state.config.public_base_url.clone())],
    )
        .into_response())
}
