// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state handed to every handler.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{
    AdminGate, AdminStore, AdminStoreError, AuthError, AuthProviderError, JwksManager,
    OtpVerifier, SupabaseAdminStore, SupabaseAuthClient,
};
use crate::blockchain::EthereumClient;
use crate::config::{AppConfig, SupabaseConfig};
use crate::providers::{CoinGeckoClient, CoinbaseClient, CoinbaseCredentials, CoinbaseOAuth, ProviderError};
use crate::verification::{InMemoryVerificationStore, VerificationStore};

/// Audience of Supabase access tokens for signed-in users.
pub const SUPABASE_AUDIENCE: &str = "authenticated";

/// How access tokens are verified.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 project secret; takes precedence over JWKS
    pub jwt_secret: Option<String>,
    /// JWKS for asymmetric project keys
    pub jwks: Option<JwksManager>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl AuthConfig {
    pub fn from_supabase(config: &SupabaseConfig) -> Result<Self, AuthError> {
        let jwks = match (&config.jwt_secret, config.jwks_url()) {
            (None, Some(url)) => Some(JwksManager::new(url)?),
            _ => None,
        };

        Ok(Self {
            jwt_secret: config.jwt_secret.clone(),
            jwks,
            issuer: config.issuer(),
            audience: config.url.as_ref().map(|_| SUPABASE_AUDIENCE.to_string()),
        })
    }

    /// Neither a secret nor JWKS: tokens are decoded without verification.
    pub fn is_development(&self) -> bool {
        self.jwt_secret.is_none() && self.jwks.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    AdminStore(#[from] AdminStoreError),
    #[error(transparent)]
    AuthProvider(#[from] AuthProviderError),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_config: Arc<AuthConfig>,
    pub coinbase: CoinbaseClient,
    pub coinbase_oauth: CoinbaseOAuth,
    pub coingecko: CoinGeckoClient,
    /// `None` when no Infura endpoint is configured
    pub ethereum: Option<Arc<EthereumClient>>,
    pub admin_gate: AdminGate,
    pub verification: Arc<dyn VerificationStore>,
    pub otp_verifier: Arc<dyn OtpVerifier>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, StartupError> {
        let auth_config = AuthConfig::from_supabase(&config.supabase)?;
        if auth_config.is_development() {
            warn!("no Supabase URL or JWT secret configured; session tokens are NOT verified");
        }

        let credentials = CoinbaseCredentials::new(config.coinbase.access_token.clone());
        let coinbase = CoinbaseClient::new(&config.coinbase, credentials)?;
        let coinbase_oauth = CoinbaseOAuth::new(&config.coinbase, config.coinbase_redirect_uri())?;
        let coingecko = CoinGeckoClient::new(&config.coingecko)?;

        let ethereum = match &config.infura_rpc_url {
            Some(url) => Some(Arc::new(EthereumClient::new(url)?)),
            None => {
                info!("INFURA_RPC_URL not set; Ethereum balance route disabled");
                None
            }
        };

        let admin_store: Arc<dyn AdminStore> = Arc::new(SupabaseAdminStore::new(&config.supabase)?);
        let otp_verifier: Arc<dyn OtpVerifier> = Arc::new(SupabaseAuthClient::new(&config.supabase)?);
        let verification: Arc<dyn VerificationStore> = Arc::new(InMemoryVerificationStore::new(
            config.verification.capacity,
            config.verification.ttl,
        ));

        Ok(Self {
            config: Arc::new(config),
            auth_config: Arc::new(auth_config),
            coinbase,
            coinbase_oauth,
            coingecko,
            ethereum,
            admin_gate: AdminGate::new(admin_store),
            verification,
            otp_verifier,
        })
    }

    /// Replace the admin authorization store.
    pub fn with_admin_store(mut self, store: Arc<dyn AdminStore>) -> Self {
        self.admin_gate = AdminGate::new(store);
        self
    }

    /// Replace the OTP verifier.
    pub fn with_otp_verifier(mut self, verifier: Arc<dyn OtpVerifier>) -> Self {
        self.otp_verifier = verifier;
        self
    }

    /// Replace the verification code store.
    pub fn with_verification_store(mut self, store: Arc<dyn VerificationStore>) -> Self {
        self.verification = store;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_development_state() {
        let state = AppState::new(AppConfig::default()).unwrap();
        assert!(state.auth_config.is_development());
        assert!(state.ethereum.is_none());
    }

    #[test]
    fn secret_takes_precedence_over_jwks() {
        let config = SupabaseConfig {
            url: Some("https://abc.supabase.co".to_string()),
            anon_key: Some("anon".to_string()),
            jwt_secret: Some("secret".to_string()),
        };
        let auth = AuthConfig::from_supabase(&config).unwrap();
        assert!(auth.jwks.is_none());
        assert_eq!(auth.issuer.as_deref(), Some("https://abc.supabase.co/auth/v1"));
        assert_eq!(auth.audience.as_deref(), Some("authenticated"));
    }

    #[test]
    fn project_url_without_secret_uses_jwks() {
        let config = SupabaseConfig {
            url: Some("https://abc.supabase.co/".to_string()),
            anon_key: None,
            jwt_secret: None,
        };
        let auth = AuthConfig::from_supabase(&config).unwrap();
        let jwks = auth.jwks.as_ref().unwrap();
        assert_eq!(jwks.jwks_url(), "https://abc.supabase.co/auth/v1/.well-known/jwks.json");
        assert!(!auth.is_development());
    }

    #[test]
    fn infura_url_enables_ethereum_client() {
        let mut config = AppConfig::default();
        config.infura_rpc_url = Some("https://mainnet.infura.io/v3/abc".to_string());
        let state = AppState::new(config).unwrap();
        assert!(state.ethereum.is_some());
    }
}
