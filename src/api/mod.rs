// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::SessionUser,
    models::{
        AdminState, ConfirmCodeRequest, IssueCodeRequest, NormalizedBalance, SolanaPriceResponse,
        VerificationOutcome, VerifyOtpRequest,
    },
    providers::{
        coinbase::{ExchangeAmount, WalletAmount, WalletCurrency},
        ExchangeAccount, WalletAccount,
    },
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod coinbase;
pub mod health;
pub mod price;
pub mod wallet_address;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/cb/exchange/balances", get(coinbase::exchange_balances))
        .route("/cb/wallet/balances", get(coinbase::wallet_balances))
        .route("/cb/oauth2/start", get(coinbase::oauth_start))
        .route("/cb/oauth2/callback", get(coinbase::oauth_callback))
        .route("/solana-price", get(price::solana_price))
        .route("/wallet-address/coinbase", get(wallet_address::coinbase_balances))
        .route("/wallet-address/infura", get(wallet_address::infura_balance))
        .route("/admin/status", get(admin::admin_status));

    let auth_routes = Router::new()
        .route("/verify", post(auth::verify_otp))
        .route("/verification-code", post(auth::issue_code))
        .route("/verification-code/confirm", post(auth::confirm_code));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/admin", get(admin::admin_page))
        .nest("/api", api_routes)
        .nest("/auth", auth_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        coinbase::exchange_balances,
        coinbase::wallet_balances,
        coinbase::oauth_start,
        coinbase::oauth_callback,
        price::solana_price,
        wallet_address::coinbase_balances,
        wallet_address::infura_balance,
        admin::admin_status,
        admin::admin_page,
        auth::verify_otp,
        auth::issue_code,
        auth::confirm_code,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            NormalizedBalance,
            SolanaPriceResponse,
            ExchangeAccount,
            ExchangeAmount,
            WalletAccount,
            WalletAmount,
            WalletCurrency,
            AdminState,
            SessionUser,
            admin::AdminPageResponse,
            VerifyOtpRequest,
            VerificationOutcome,
            IssueCodeRequest,
            ConfirmCodeRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Coinbase", description = "Coinbase accounts and OAuth"),
        (name = "Balances", description = "Normalized balances"),
        (name = "Prices", description = "Market prices"),
        (name = "Admin", description = "Admin gate"),
        (name = "Auth", description = "OTP and email verification"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
