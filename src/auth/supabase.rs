// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Supabase Auth (GoTrue) OTP verification.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{SupabaseConfig, UPSTREAM_TIMEOUT};

#[derive(Debug, thiserror::Error)]
pub enum AuthProviderError {
    #[error("Supabase Auth is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Supabase Auth request failed: {0}")]
    Transport(String),

    /// GoTrue refused the token (expired, already used, unknown)
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Supabase Auth response was invalid: {0}")]
    Parse(String),
}

/// The user an OTP token hash was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedOtp {
    pub user_id: String,
    pub email: Option<String>,
}

/// Verifies emailed one-time tokens with the auth provider.
#[async_trait]
pub trait OtpVerifier: Send + Sync {
    async fn verify_otp(&self, token_hash: &str) -> Result<VerifiedOtp, AuthProviderError>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user: Option<VerifyUser>,
}

#[derive(Debug, Deserialize)]
struct VerifyUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// GoTrue error bodies use several shapes across versions.
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl GoTrueError {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
    }
}

/// `POST /auth/v1/verify` client.
#[derive(Debug, Clone)]
pub struct SupabaseAuthClient {
    auth_url: Option<String>,
    anon_key: Option<String>,
    http: Client,
}

impl SupabaseAuthClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, AuthProviderError> {
        let http = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| AuthProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            auth_url: config.issuer(),
            anon_key: config.anon_key.clone(),
            http,
        })
    }
}

#[async_trait]
impl OtpVerifier for SupabaseAuthClient {
    async fn verify_otp(&self, token_hash: &str) -> Result<VerifiedOtp, AuthProviderError> {
        let auth_url = self
            .auth_url
            .as_deref()
            .ok_or(AuthProviderError::NotConfigured("PUBLIC_SUPABASE_URL is unset"))?;
        let anon_key = self
            .anon_key
            .as_deref()
            .ok_or(AuthProviderError::NotConfigured("PUBLIC_SUPABASE_ANON_KEY is unset"))?;

        let url = format!("{auth_url}/verify");
        debug!(%url, "verifying OTP token hash");

        let response = self
            .http
            .post(&url)
            .header("apikey", anon_key)
            .json(&json!({ "type": "email", "token_hash": token_hash }))
            .send()
            .await
            .map_err(|e| AuthProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GoTrueError>(&body)
                .ok()
                .and_then(GoTrueError::into_message)
                .unwrap_or_else(|| format!("verification failed with HTTP {}", status.as_u16()));
            return Err(AuthProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: VerifyResponse =
            serde_json::from_str(&body).map_err(|e| AuthProviderError::Parse(e.to_string()))?;
        let user = parsed
            .user
            .ok_or_else(|| AuthProviderError::Parse("response has no user".to_string()))?;

        Ok(VerifiedOtp {
            user_id: user.id,
            email: user.email,
        })
    }
}
