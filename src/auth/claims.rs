// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Supabase access-token claims and the session built from them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims carried by a Supabase (GoTrue) access token.
///
/// See: https://supabase.com/docs/guides/auth/jwt-fields
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseClaims {
    /// Subject: the `auth.users.id` UUID
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Issuer (`<project url>/auth/v1`)
    #[serde(default)]
    pub iss: Option<String>,

    /// Audience (validated by jsonwebtoken, not read directly)
    #[serde(default)]
    pub aud: Option<serde_json::Value>,

    #[serde(default)]
    pub session_id: Option<String>,

    /// Postgres role (`authenticated`, `anon`, `service_role`)
    #[serde(default)]
    pub role: Option<String>,
}

/// The user half of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    /// Canonical user ID (`sub` claim)
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Authenticated Supabase session for the current request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub user: SessionUser,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token expiration (Unix timestamp)
    pub expires_at: i64,

    /// Raw access token, forwarded to PostgREST for row-level security
    #[serde(skip)]
    pub access_token: String,
}

impl Session {
    /// Build a session from verified claims.
    pub fn from_claims(claims: SupabaseClaims, access_token: impl Into<String>) -> Self {
        Self {
            user: SessionUser {
                id: claims.sub,
                email: claims.email,
            },
            session_id: claims.session_id,
            expires_at: claims.exp,
            access_token: access_token.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}
