// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OTP verification and email verification-code endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info, warn};

use crate::{
    models::{ConfirmCodeRequest, IssueCodeRequest, VerificationOutcome, VerifyOtpRequest},
    state::AppState,
    verification::{generate_code, is_plausible_email, ConfirmOutcome},
};

type OutcomeResponse = (StatusCode, Json<VerificationOutcome>);

fn outcome(status: StatusCode, outcome: VerificationOutcome) -> OutcomeResponse {
    (status, Json(outcome))
}

/// Unwrap a JSON body, answering malformed ones in the same outcome shape.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, OutcomeResponse> {
    payload.map(|Json(request)| request).map_err(|rejection| {
        debug!(error = %rejection.body_text(), "rejected request body");
        outcome(
            rejection.status(),
            VerificationOutcome::failed(rejection.body_text()),
        )
    })
}

/// Verify an emailed OTP token hash with Supabase Auth.
///
/// A successful verification also discards any pending verification code
/// for the verified email.
#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = "Auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Token verified", body = VerificationOutcome),
        (status = 400, description = "Token missing", body = VerificationOutcome),
        (status = 415, description = "Body is not JSON", body = VerificationOutcome),
        (status = 422, description = "Body does not match the schema", body = VerificationOutcome),
        (status = 500, description = "Verification failed", body = VerificationOutcome)
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> OutcomeResponse {
    let request = match body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let token = request.token.trim();
    if token.is_empty() {
        return outcome(StatusCode::BAD_REQUEST, VerificationOutcome::failed("token is required"));
    }

    match state.otp_verifier.verify_otp(token).await {
        Ok(verified) => {
            if let Some(email) = &verified.email {
                state.verification.remove(email);
            }
            info!(user_id = %verified.user_id, "OTP verified");
            outcome(StatusCode::OK, VerificationOutcome::ok())
        }
        Err(e) => {
            warn!(error = %e, "OTP verification failed");
            outcome(
                StatusCode::INTERNAL_SERVER_ERROR,
                VerificationOutcome::failed(e.to_string()),
            )
        }
    }
}

/// Issue a 6-digit verification code for an email.
///
/// The code is stored for later confirmation; delivering it is up to the
/// caller.
#[utoipa::path(
    post,
    path = "/auth/verification-code",
    tag = "Auth",
    request_body = IssueCodeRequest,
    responses(
        (status = 202, description = "Code issued", body = VerificationOutcome),
        (status = 400, description = "Invalid email or malformed body", body = VerificationOutcome)
    )
)]
pub async fn issue_code(
    State(state): State<AppState>,
    payload: Result<Json<IssueCodeRequest>, JsonRejection>,
) -> OutcomeResponse {
    let request = match body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if !is_plausible_email(&request.email) {
        return outcome(
            StatusCode::BAD_REQUEST,
            VerificationOutcome::failed("a valid email is required"),
        );
    }

    let code = generate_code();
    debug!(email = %request.email, %code, "verification code issued");
    state.verification.set(&request.email, code);

    outcome(StatusCode::ACCEPTED, VerificationOutcome::ok())
}

/// Confirm a verification code.
///
/// The code is consumed on a match, and discarded after too many wrong
/// guesses.
#[utoipa::path(
    post,
    path = "/auth/verification-code/confirm",
    tag = "Auth",
    request_body = ConfirmCodeRequest,
    responses(
        (status = 200, description = "Code confirmed", body = VerificationOutcome),
        (status = 400, description = "Wrong, expired or unknown code", body = VerificationOutcome),
        (status = 429, description = "Too many wrong guesses; the code was discarded", body = VerificationOutcome)
    )
)]
pub async fn confirm_code(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmCodeRequest>, JsonRejection>,
) -> OutcomeResponse {
    let request = match body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.verification.confirm(&request.email, &request.code) {
        ConfirmOutcome::Confirmed => outcome(StatusCode::OK, VerificationOutcome::ok()),
        ConfirmOutcome::Mismatch => outcome(
            StatusCode::BAD_REQUEST,
            VerificationOutcome::failed("verification code does not match"),
        ),
        ConfirmOutcome::Exhausted => outcome(
            StatusCode::TOO_MANY_REQUESTS,
            VerificationOutcome::failed("too many attempts; request a new verification code"),
        ),
        ConfirmOutcome::Missing => outcome(
            StatusCode::BAD_REQUEST,
            VerificationOutcome::failed("no pending verification code for this email"),
        ),
    }
}
