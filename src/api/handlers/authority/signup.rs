//! Authority signup: stage the profile and send a verification link.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::super::password::hash_password;
use super::super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::super::secrets::{extract_client_ip, generate_verification_token, normalize_email};
use super::super::{AppState, MessageResponse, valid_email};
use super::storage::{self, SignupOutcome};
use super::types::SignupRequest;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Stage an authority registration and queue the verification email.
#[utoipa::path(
    post,
    path = "/authority/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Signup staged; verification email queued", body = MessageResponse),
        (status = 400, description = "Validation error, pending registration or email in use", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "authority"
)]
pub async fn signup(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::new("Missing payload")),
            )
                .into_response();
        }
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Invalid email")),
        )
            .into_response();
    }

    if request.password.len() < MIN_PASSWORD_LENGTH {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Password too short")),
        )
            .into_response();
    }

    let full_name = request.full_name.trim();
    let designation = request.designation.trim();
    let department = request.department.trim();
    if full_name.is_empty() || designation.is_empty() || department.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Missing profile fields")),
        )
            .into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Signup)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_identifier(&email, RateLimitAction::Signup)
            == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse::new("Rate limited")),
        )
            .into_response();
    }

    // Hash before staging; the raw password never reaches the database.
    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Signup failed")),
            )
                .into_response();
        }
    };

    let token = match generate_verification_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate verification token: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Signup failed")),
            )
                .into_response();
        }
    };

    match storage::stage_signup(
        &pool,
        &email,
        full_name,
        designation,
        department,
        &password_hash,
        &token,
        state.config(),
    )
    .await
    {
        Ok(SignupOutcome::Created) => (
            StatusCode::CREATED,
            Json(MessageResponse::new(
                "Signup successful. Please check your email to verify your account.",
            )),
        )
            .into_response(),
        Ok(SignupOutcome::AlreadyPending) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Registration already pending")),
        )
            .into_response(),
        Ok(SignupOutcome::AccountExists) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Email already in use")),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to stage authority signup: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Signup failed")),
            )
                .into_response()
        }
    }
}
