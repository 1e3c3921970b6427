// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin authorization store and gate.
//!
//! A user is an administrator when at least one row keyed by their user id
//! exists in the `admin_users` table. The gate is evaluated on every page
//! load and never caches its answer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client};
use tracing::{debug, info};

use super::claims::Session;
use crate::config::{SupabaseConfig, UPSTREAM_TIMEOUT};
use crate::models::AdminState;

/// PostgREST table holding one row per administrator.
pub const ADMIN_TABLE: &str = "admin_users";

#[derive(Debug, thiserror::Error)]
pub enum AdminStoreError {
    #[error("admin store is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("admin store request failed: {0}")]
    Transport(String),

    #[error("admin store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("admin store response was invalid: {0}")]
    Parse(String),
}

/// Source of truth for admin membership.
#[async_trait]
pub trait AdminStore: Send + Sync {
    /// Number of `admin_users` rows for `user_id`.
    ///
    /// `bearer` is the caller's access token when the store enforces
    /// row-level security.
    async fn count_admin_rows(
        &self,
        user_id: &str,
        bearer: Option<&str>,
    ) -> Result<usize, AdminStoreError>;
}

/// `admin_users` lookup through Supabase PostgREST.
#[derive(Debug, Clone)]
pub struct SupabaseAdminStore {
    rest_url: Option<String>,
    anon_key: Option<String>,
    http: Client,
}

impl SupabaseAdminStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self, AdminStoreError> {
        let http = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| AdminStoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            rest_url: config
                .url
                .as_deref()
                .map(|url| format!("{}/rest/v1", url.trim_end_matches('/'))),
            anon_key: config.anon_key.clone(),
            http,
        })
    }
}

#[async_trait]
impl AdminStore for SupabaseAdminStore {
    async fn count_admin_rows(
        &self,
        user_id: &str,
        bearer: Option<&str>,
    ) -> Result<usize, AdminStoreError> {
        let rest_url = self
            .rest_url
            .as_deref()
            .ok_or(AdminStoreError::NotConfigured("PUBLIC_SUPABASE_URL is unset"))?;
        let anon_key = self
            .anon_key
            .as_deref()
            .ok_or(AdminStoreError::NotConfigured("PUBLIC_SUPABASE_ANON_KEY is unset"))?;

        let url = format!("{rest_url}/{ADMIN_TABLE}");
        debug!(%url, user_id, "querying admin store");

        let response = self
            .http
            .get(&url)
            .header("apikey", anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", bearer.unwrap_or(anon_key)))
            .query(&[("select", "user_id".to_string()), ("user_id", format!("eq.{user_id}"))])
            .send()
            .await
            .map_err(|e| AdminStoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdminStoreError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(AdminStoreError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| AdminStoreError::Parse(e.to_string()))?;
        Ok(rows.len())
    }
}

/// Process-local admin list for development and tests.
///
/// Counts every lookup so callers can assert that a check was skipped.
#[derive(Debug, Default)]
pub struct InMemoryAdminStore {
    admins: HashSet<String>,
    calls: AtomicUsize,
}

impl InMemoryAdminStore {
    pub fn with_admins<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminStore for InMemoryAdminStore {
    async fn count_admin_rows(
        &self,
        user_id: &str,
        _bearer: Option<&str>,
    ) -> Result<usize, AdminStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(usize::from(self.admins.contains(user_id)))
    }
}

/// Decides whether the current session belongs to an administrator.
#[derive(Clone)]
pub struct AdminGate {
    store: Arc<dyn AdminStore>,
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate").finish_non_exhaustive()
    }
}

impl AdminGate {
    pub fn new(store: Arc<dyn AdminStore>) -> Self {
        Self { store }
    }

    /// Run the admin check for one page load.
    ///
    /// Without a session the store is not queried.
    pub async fn check(&self, session: Option<&Session>) -> Result<AdminState, AdminStoreError> {
        let Some(session) = session else {
            return Ok(AdminState::checked(false));
        };

        let rows = self
            .store
            .count_admin_rows(session.user_id(), Some(&session.access_token))
            .await?;
        let is_admin = rows > 0;
        info!(user_id = session.user_id(), is_admin, "admin check");
        Ok(AdminState::checked(is_admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::SessionUser;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(user_id: &str) -> Session {
        Session {
            user: SessionUser {
                id: user_id.to_string(),
                email: None,
            },
            session_id: None,
            expires_at: 0,
            access_token: "user-jwt".to_string(),
        }
    }

    #[tokio::test]
    async fn no_session_skips_the_store() {
        let store = Arc::new(InMemoryAdminStore::with_admins(["admin-1"]));
        let gate = AdminGate::new(store.clone());

        let state = gate.check(None).await.unwrap();
        assert_eq!(state, AdminState::checked(false));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn row_presence_decides_admin() {
        let store = Arc::new(InMemoryAdminStore::with_admins(["admin-1"]));
        let gate = AdminGate::new(store.clone());

        assert!(gate.check(Some(&session("admin-1"))).await.unwrap().is_admin);
        assert!(!gate.check(Some(&session("user-2"))).await.unwrap().is_admin);
        assert_eq!(store.calls(), 2);

        // No caching: every check is a fresh lookup.
        assert!(gate.check(Some(&session("admin-1"))).await.unwrap().is_admin);
        assert_eq!(store.calls(), 3);
    }

    fn supabase_store(server: &MockServer) -> SupabaseAdminStore {
        SupabaseAdminStore::new(&SupabaseConfig {
            url: Some(server.uri()),
            anon_key: Some("anon".to_string()),
            jwt_secret: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn postgrest_rows_are_counted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/admin_users"))
            .and(query_param("select", "user_id"))
            .and(query_param("user_id", "eq.admin-1"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "user_id": "admin-1" }])))
            .expect(1)
            .mount(&server)
            .await;

        let gate = AdminGate::new(Arc::new(supabase_store(&server)));
        let state = gate.check(Some(&session("admin-1"))).await.unwrap();
        assert_eq!(state, AdminState::checked(true));
    }

    #[tokio::test]
    async fn empty_result_is_not_admin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let count = supabase_store(&server)
            .count_admin_rows("user-2", None)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn store_failure_is_an_error_not_a_denial() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;

        let gate = AdminGate::new(Arc::new(supabase_store(&server)));
        let err = gate.check(Some(&session("admin-1"))).await.unwrap_err();
        assert!(matches!(err, AdminStoreError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn unconfigured_store_reports_missing_settings() {
        let store = SupabaseAdminStore::new(&SupabaseConfig::default()).unwrap();
        let err = store.count_admin_rows("u", None).await.unwrap_err();
        assert!(matches!(err, AdminStoreError::NotConfigured(_)));
    }
}
