// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the typed [`AppConfig`] loaded
//! once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PUBLIC_BASE_URL` | Public origin of this service (OAuth redirects) | `http://localhost:8080` |
//! | `PUBLIC_SUPABASE_URL` | Supabase project URL | Required for auth |
//! | `PUBLIC_SUPABASE_ANON_KEY` | Supabase anon key (PostgREST + GoTrue) | Required for auth |
//! | `SUPABASE_JWT_SECRET` | HS256 secret for access tokens | Optional (JWKS used otherwise) |
//! | `COINBASE_AUTH_URL` | Coinbase OAuth authorize endpoint | `https://login.coinbase.com/oauth2/auth` |
//! | `COINBASE_TOKEN_URL` | Coinbase OAuth token endpoint | `https://login.coinbase.com/oauth2/token` |
//! | `COINBASE_CLIENT_ID` | Coinbase OAuth client id | Required for OAuth |
//! | `COINBASE_CLIENT_SECRET` | Coinbase OAuth client secret | Required for callback |
//! | `COINBASE_ACCESS_TOKEN` | Static Coinbase bearer token | Optional |
//! | `COINBASE_OAUTH_STATE_SECRET` | HMAC key for OAuth `state` | Random per process |
//! | `COINBASE_EXCHANGE_API_URL` | Advanced Trade API base | `https://api.coinbase.com/api/v3/brokerage` |
//! | `COINBASE_WALLET_API_URL` | Wallet API base | `https://api.coinbase.com/v2` |
//! | `INFURA_RPC_URL` | Full Ethereum JSON-RPC URL | Derived from `INFURA_PROJECT_ID` |
//! | `INFURA_PROJECT_ID` | Infura project id (mainnet) | Optional |
//! | `COINGECKO_API_URL` | CoinGecko API base | `https://api.coingecko.com/api/v3` |
//! | `COINGECKO_API_KEY` | CoinGecko demo/pro key | Optional |
//! | `COINGECKO_MISSING_PRICE` | `error` or `zero` when the price field is absent | `error` |
//! | `VERIFICATION_CODE_TTL_SECS` | Verification code lifetime, `0` disables expiry | `600` |
//! | `VERIFICATION_STORE_CAPACITY` | Max pending verification codes | `10000` |
//! | `LOGIN_PATH` | Redirect target for pages that need a session | `/login` |
//! | `NON_ADMIN_PATH` | Redirect target for non-admin sessions | `/` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Unset (HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const SUPABASE_URL_ENV: &str = "PUBLIC_SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "PUBLIC_SUPABASE_ANON_KEY";
pub const SUPABASE_JWT_SECRET_ENV: &str = "SUPABASE_JWT_SECRET";
pub const COINBASE_AUTH_URL_ENV: &str = "COINBASE_AUTH_URL";
pub const COINBASE_TOKEN_URL_ENV: &str = "COINBASE_TOKEN_URL";
pub const COINBASE_CLIENT_ID_ENV: &str = "COINBASE_CLIENT_ID";
pub const COINBASE_CLIENT_SECRET_ENV: &str = "COINBASE_CLIENT_SECRET";
pub const COINBASE_ACCESS_TOKEN_ENV: &str = "COINBASE_ACCESS_TOKEN";
pub const COINBASE_OAUTH_STATE_SECRET_ENV: &str = "COINBASE_OAUTH_STATE_SECRET";
pub const COINBASE_EXCHANGE_API_URL_ENV: &str = "COINBASE_EXCHANGE_API_URL";
pub const COINBASE_WALLET_API_URL_ENV: &str = "COINBASE_WALLET_API_URL";
pub const INFURA_RPC_URL_ENV: &str = "INFURA_RPC_URL";
pub const INFURA_PROJECT_ID_ENV: &str = "INFURA_PROJECT_ID";
pub const COINGECKO_API_URL_ENV: &str = "COINGECKO_API_URL";
pub const COINGECKO_API_KEY_ENV: &str = "COINGECKO_API_KEY";
pub const COINGECKO_MISSING_PRICE_ENV: &str = "COINGECKO_MISSING_PRICE";
pub const VERIFICATION_TTL_ENV: &str = "VERIFICATION_CODE_TTL_SECS";
pub const VERIFICATION_CAPACITY_ENV: &str = "VERIFICATION_STORE_CAPACITY";
pub const LOGIN_PATH_ENV: &str = "LOGIN_PATH";
pub const NON_ADMIN_PATH_ENV: &str = "NON_ADMIN_PATH";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_COINBASE_AUTH_URL: &str = "https://login.coinbase.com/oauth2/auth";
const DEFAULT_COINBASE_TOKEN_URL: &str = "https://login.coinbase.com/oauth2/token";
const DEFAULT_COINBASE_EXCHANGE_API_URL: &str = "https://api.coinbase.com/api/v3/brokerage";
const DEFAULT_COINBASE_WALLET_API_URL: &str = "https://api.coinbase.com/v2";
const DEFAULT_INFURA_MAINNET_URL: &str = "https://mainnet.infura.io/v3";
const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_VERIFICATION_TTL_SECS: u64 = 600;
const DEFAULT_VERIFICATION_CAPACITY: usize = 10_000;
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_NON_ADMIN_PATH: &str = "/";

/// Timeout applied to every upstream HTTP client.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// What the CoinGecko client does when `/simple/price` answers 200 but the
/// requested coin or currency is missing from the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPricePolicy {
    /// Surface an `UpstreamParse` error.
    #[default]
    Error,
    /// Report a price of `0.0`.
    Zero,
}

#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub jwt_secret: Option<String>,
}

impl SupabaseConfig {
    /// Expected `iss` claim of Supabase access tokens.
    pub fn issuer(&self) -> Option<String> {
        self.url
            .as_deref()
            .map(|url| format!("{}/auth/v1", url.trim_end_matches('/')))
    }

    /// JWKS endpoint for asymmetric signing keys.
    pub fn jwks_url(&self) -> Option<String> {
        self.issuer()
            .map(|issuer| format!("{issuer}/.well-known/jwks.json"))
    }
}

#[derive(Debug, Clone)]
pub struct CoinbaseConfig {
    pub auth_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub oauth_state_secret: Option<String>,
    pub exchange_api_url: String,
    pub wallet_api_url: String,
}

impl Default for CoinbaseConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_COINBASE_AUTH_URL.to_string(),
            token_url: DEFAULT_COINBASE_TOKEN_URL.to_string(),
            client_id: None,
            client_secret: None,
            access_token: None,
            oauth_state_secret: None,
            exchange_api_url: DEFAULT_COINBASE_EXCHANGE_API_URL.to_string(),
            wallet_api_url: DEFAULT_COINBASE_WALLET_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub missing_price: MissingPricePolicy,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_COINGECKO_API_URL.to_string(),
            api_key: None,
            missing_price: MissingPricePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// `None` keeps codes until consumed or evicted.
    pub ttl: Option<Duration>,
    pub capacity: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(DEFAULT_VERIFICATION_TTL_SECS)),
            capacity: DEFAULT_VERIFICATION_CAPACITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectConfig {
    pub login_path: String,
    pub non_admin_path: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            non_admin_path: DEFAULT_NON_ADMIN_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    pub log_format: LogFormat,
    pub supabase: SupabaseConfig,
    pub coinbase: CoinbaseConfig,
    /// Ethereum JSON-RPC endpoint; `None` disables the Infura route.
    pub infura_rpc_url: Option<String>,
    pub coingecko: CoinGeckoConfig,
    pub verification: VerificationConfig,
    pub redirects: RedirectConfig,
    pub tls: Option<TlsPaths>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            log_format: LogFormat::default(),
            supabase: SupabaseConfig::default(),
            coinbase: CoinbaseConfig::default(),
            infura_rpc_url: None,
            coingecko: CoinGeckoConfig::default(),
            verification: VerificationConfig::default(),
            redirects: RedirectConfig::default(),
            tls: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let port = match get(PORT_ENV) {
            Some(raw) => parse_value(PORT_ENV, &raw)?,
            None => DEFAULT_PORT,
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(v) if v == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other,
                    reason: "expected `json` or `pretty`".to_string(),
                })
            }
        };

        let missing_price = match get(COINGECKO_MISSING_PRICE_ENV)
            .as_deref()
            .map(str::to_ascii_lowercase)
        {
            None => MissingPricePolicy::Error,
            Some(v) if v == "error" => MissingPricePolicy::Error,
            Some(v) if v == "zero" => MissingPricePolicy::Zero,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: COINGECKO_MISSING_PRICE_ENV,
                    value: other,
                    reason: "expected `error` or `zero`".to_string(),
                })
            }
        };

        let ttl_secs: u64 = match get(VERIFICATION_TTL_ENV) {
            Some(raw) => parse_value(VERIFICATION_TTL_ENV, &raw)?,
            None => DEFAULT_VERIFICATION_TTL_SECS,
        };
        let capacity: usize = match get(VERIFICATION_CAPACITY_ENV) {
            Some(raw) => parse_value(VERIFICATION_CAPACITY_ENV, &raw)?,
            None => DEFAULT_VERIFICATION_CAPACITY,
        };
        if capacity == 0 {
            return Err(ConfigError::Invalid {
                name: VERIFICATION_CAPACITY_ENV,
                value: "0".to_string(),
                reason: "capacity must be at least 1".to_string(),
            });
        }

        let infura_rpc_url = get(INFURA_RPC_URL_ENV).or_else(|| {
            get(INFURA_PROJECT_ID_ENV).map(|id| format!("{DEFAULT_INFURA_MAINNET_URL}/{id}"))
        });

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert_path), Some(key_path)) => Some(TlsPaths {
                cert_path,
                key_path,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        Ok(Self {
            host: get_or(HOST_ENV, DEFAULT_HOST),
            port,
            public_base_url: get_or(PUBLIC_BASE_URL_ENV, DEFAULT_PUBLIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            log_format,
            supabase: SupabaseConfig {
                url: get(SUPABASE_URL_ENV),
                anon_key: get(SUPABASE_ANON_KEY_ENV),
                jwt_secret: get(SUPABASE_JWT_SECRET_ENV),
            },
            coinbase: CoinbaseConfig {
                auth_url: get_or(COINBASE_AUTH_URL_ENV, DEFAULT_COINBASE_AUTH_URL),
                token_url: get_or(COINBASE_TOKEN_URL_ENV, DEFAULT_COINBASE_TOKEN_URL),
                client_id: get(COINBASE_CLIENT_ID_ENV),
                client_secret: get(COINBASE_CLIENT_SECRET_ENV),
                access_token: get(COINBASE_ACCESS_TOKEN_ENV),
                oauth_state_secret: get(COINBASE_OAUTH_STATE_SECRET_ENV),
                exchange_api_url: get_or(
                    COINBASE_EXCHANGE_API_URL_ENV,
                    DEFAULT_COINBASE_EXCHANGE_API_URL,
                ),
                wallet_api_url: get_or(COINBASE_WALLET_API_URL_ENV, DEFAULT_COINBASE_WALLET_API_URL),
            },
            infura_rpc_url,
            coingecko: CoinGeckoConfig {
                api_url: get_or(COINGECKO_API_URL_ENV, DEFAULT_COINGECKO_API_URL),
                api_key: get(COINGECKO_API_KEY_ENV),
                missing_price,
            },
            verification: VerificationConfig {
                ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
                capacity,
            },
            redirects: RedirectConfig {
                login_path: get_or(LOGIN_PATH_ENV, DEFAULT_LOGIN_PATH),
                non_admin_path: get_or(NON_ADMIN_PATH_ENV, DEFAULT_NON_ADMIN_PATH),
            },
            tls,
        })
    }

    /// Redirect URI registered with Coinbase for the OAuth callback.
    pub fn coinbase_redirect_uri(&self) -> String {
        format!("{}/api/cb/oauth2/callback", self.public_base_url)
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
