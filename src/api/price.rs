// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{error::ApiError, models::SolanaPriceResponse, state::AppState};

/// Current SOL price in USD from CoinGecko.
#[utoipa::path(
    get,
    path = "/api/solana-price",
    tag = "Prices",
    responses(
        (status = 200, description = "Current price", body = SolanaPriceResponse),
        (status = 500, description = "CoinGecko request failed")
    )
)]
pub async fn solana_price(
    State(state): State<AppState>,
) -> Result<Json<SolanaPriceResponse>, ApiError> {
    let price = state.coingecko.solana_usd_price().await?;
    Ok(Json(SolanaPriceResponse { price }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, test_util::send};
    use crate::config::AppConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn app_with(response: ResponseTemplate) -> (axum::Router, MockServer) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(response)
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.coingecko.api_url = server.uri();
        (router(AppState::new(config).unwrap()), server)
    }

    fn request() -> Request<Body> {
        Request::builder()
            .uri("/api/solana-price")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn returns_price() {
        let (app, _server) =
            app_with(ResponseTemplate::new(200).set_body_json(json!({ "solana": { "usd": 123.45 } })))
                .await;

        let (status, body) = send(app, request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "price": 123.45 }));
    }

    #[tokio::test]
    async fn upstream_failure_is_error_json() {
        let (app, _server) = app_with(ResponseTemplate::new(429).set_body_string("slow down")).await;

        let (status, body) = send(app, request()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("429"));
    }
}
