// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::auth::AdminStoreError;
use crate::providers::{OAuthError, ProviderError};

/// Error envelope returned by every JSON route: `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidAddress(_) => Self::bad_request(err.to_string()),
            other => {
                warn!(error = %other, "upstream provider call failed");
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<AdminStoreError> for ApiError {
    fn from(err: AdminStoreError) -> Self {
        warn!(error = %err, "admin store lookup failed");
        Self::internal(err.to_string())
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::InvalidState | OAuthError::ExpiredState | OAuthError::ReplayedState => {
                Self::bad_request(err.to_string())
            }
            other => {
                warn!(error = %other, "Coinbase OAuth step failed");
                Self::internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let internal = ApiError::internal("boom");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "boom");
    }

    #[test]
    fn upstream_failures_map_to_500() {
        let err: ApiError = ProviderError::UpstreamHttp {
            provider: "CoinGecko",
            status: 429,
            body: "rate limited".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("429"));

        let err: ApiError = ProviderError::UpstreamParse {
            provider: "Coinbase Wallet",
            detail: "missing data".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_address_maps_to_400() {
        let err: ApiError = ProviderError::InvalidAddress("0x12".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn oauth_state_problems_are_client_errors() {
        let err: ApiError = OAuthError::ExpiredState.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = OAuthError::ReplayedState.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = OAuthError::TokenExchange("401".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::internal("upstream down").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"upstream down"}"#);
    }
}
