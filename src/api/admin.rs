// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin status and the guarded admin page.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{AdminGuard, OptionalSession, SessionUser},
    error::ApiError,
    models::AdminState,
    state::AppState,
};

/// Data for the admin page.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminPageResponse {
    pub user: SessionUser,
}

/// Admin status for the current session.
///
/// Without a session the answer is `isAdmin: false` and no lookup is made.
#[utoipa::path(
    get,
    path = "/api/admin/status",
    tag = "Admin",
    security((), ("bearer" = [])),
    responses(
        (status = 200, description = "Admin check completed", body = AdminState),
        (status = 500, description = "Admin store unavailable")
    )
)]
pub async fn admin_status(
    OptionalSession(session): OptionalSession,
    State(state): State<AppState>,
) -> Result<Json<AdminState>, ApiError> {
    let admin = state.admin_gate.check(session.as_ref()).await?;
    Ok(Json(admin))
}

/// Admin page load.
///
/// Redirects (303) to the login page without a session and to the
/// non-admin landing page for other users. JSON callers get 401 / 403.
#[utoipa::path(
    get,
    path = "/admin",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller is an administrator", body = AdminPageResponse),
        (status = 303, description = "Redirect to login or non-admin page"),
        (status = 401, description = "JSON caller without a session"),
        (status = 403, description = "JSON caller is not an administrator"),
        (status = 500, description = "Admin store unavailable")
    )
)]
pub async fn admin_page(AdminGuard(session): AdminGuard) -> Json<AdminPageResponse> {
    Json(AdminPageResponse { user: session.user })
}
