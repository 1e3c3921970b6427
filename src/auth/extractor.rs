// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for Supabase sessions.
//!
//! ```rust,ignore
//! async fn profile(RequireSession(session): RequireSession) -> impl IntoResponse {
//!     // session.user.id is the Supabase user id
//! }
//! ```
//!
//! The access token is read from `Authorization: Bearer <token>` or, for
//! browser page loads, from the `sb-access-token` cookie.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{ACCEPT, AUTHORIZATION, COOKIE},
        request::Parts,
    },
    response::{IntoResponse, Redirect, Response},
};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};

use super::{AuthError, JwksManager, Session, SupabaseClaims};
use crate::error::ApiError;
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Cookie carrying the access token on browser requests.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// Extractor that requires a valid Supabase session.
///
/// ## Verification Modes
///
/// - **Shared secret** (`SUPABASE_JWT_SECRET` set): HS256 verification
/// - **JWKS** (`PUBLIC_SUPABASE_URL` set): asymmetric keys from the project JWKS
/// - **Development** (neither set): structure and expiry only, no signature check
pub struct RequireSession(pub Session);

impl FromRequestParts<AppState> for RequireSession {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(RequireSession(session));
        }

        let token = access_token(parts)?;
        let session = verify_jwt(&token, &state.auth_config).await?;
        parts.extensions.insert(session.clone());

        Ok(RequireSession(session))
    }
}

/// Optional session extractor.
///
/// Missing or invalid tokens yield `None` instead of a rejection.
pub struct OptionalSession(pub Option<Session>);

impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match RequireSession::from_request_parts(parts, state).await {
            Ok(RequireSession(session)) => Ok(OptionalSession(Some(session))),
            Err(AuthError::SessionMissing) => Ok(OptionalSession(None)),
            Err(e) => {
                debug!(error = %e, "ignoring invalid session token");
                Ok(OptionalSession(None))
            }
        }
    }
}

/// Page-load guard that admits administrators only.
///
/// Without a session it redirects (303) to the login path; a session that
/// is not an admin is redirected to the non-admin landing path. Callers that
/// ask for JSON (and not HTML) get `401 session_missing` / `403
/// authorization_denied` instead of redirects. Admin store failures are a
/// 500, never an admission.
pub struct AdminGuard(pub Session);

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let redirects = &state.config.redirects;
        let json = prefers_json(parts);

        let OptionalSession(session) = match OptionalSession::from_request_parts(parts, state).await {
            Ok(session) => session,
            Err(never) => match never {},
        };
        let Some(session) = session else {
            if json {
                return Err(AuthError::SessionMissing.into_response());
            }
            return Err(Redirect::to(&redirects.login_path).into_response());
        };

        let admin = state
            .admin_gate
            .check(Some(&session))
            .await
            .map_err(|e| ApiError::from(e).into_response())?;

        if !admin.is_admin {
            debug!(user_id = %session.user_id(), "admin page denied");
            if json {
                return Err(AuthError::AuthorizationDenied.into_response());
            }
            return Err(Redirect::to(&redirects.non_admin_path).into_response());
        }

        Ok(AdminGuard(session))
    }
}

/// True when the `Accept` header asks for JSON and not for an HTML page.
fn prefers_json(parts: &Parts) -> bool {
    let accept = parts
        .headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");
    accept.contains("application/json") && !accept.contains("text/html")
}

/// Pull the raw access token from the request.
fn access_token(parts: &Parts) -> Result<String, AuthError> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;
        return Ok(token.to_string());
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == ACCESS_TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .ok_or(AuthError::SessionMissing)
}

/// Verify an access token and build the session.
async fn verify_jwt(token: &str, auth_config: &AuthConfig) -> Result<Session, AuthError> {
    if let Some(secret) = &auth_config.jwt_secret {
        let key = DecodingKey::from_secret(secret.as_bytes());
        return verify_with_key(token, &key, Algorithm::HS256, auth_config);
    }

    if let Some(jwks) = &auth_config.jwks {
        return verify_jwt_jwks(token, jwks, auth_config).await;
    }

    verify_jwt_development(token)
}

/// JWKS verification for asymmetric project keys.
async fn verify_jwt_jwks(
    token: &str,
    jwks: &JwksManager,
    auth_config: &AuthConfig,
) -> Result<Session, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

    let (decoding_key, algorithm) = match &header.kid {
        Some(kid) => jwks.get_decoding_key(kid).await?,
        None => jwks.get_any_decoding_key().await?,
    };

    verify_with_key(token, &decoding_key, algorithm, auth_config)
}

fn verify_with_key(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    auth_config: &AuthConfig,
) -> Result<Session, AuthError> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;

    if let Some(issuer) = &auth_config.issuer {
        validation.set_issuer(&[issuer]);
    }

    match &auth_config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<SupabaseClaims>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        _ => AuthError::MalformedToken,
    })?;

    Ok(Session::from_claims(token_data.claims, token))
}

/// Development verification (no signature check).
fn verify_jwt_development(token: &str) -> Result<Session, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<SupabaseClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    warn!(user_id = %claims.sub, "accepted unsigned session token (development mode)");
    Ok(Session::from_claims(claims, token))
}
