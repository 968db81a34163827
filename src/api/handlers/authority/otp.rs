//! CAPTCHA-gated OTP login for activated authority accounts.
//!
//! This path never activates accounts; `send-otp` requires an existing
//! authority and `verify-otp` returns the same summary as password login.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::super::secrets::{extract_client_ip, generate_otp, normalize_email};
use super::super::{AppState, CaptchaDecision, MessageResponse, valid_email};
use super::storage::{self, OtpLoginOutcome};
use super::types::{AuthoritySummary, SendOtpRequest, VerifyOtpRequest};

/// Run the CAPTCHA check; `Some(response)` short-circuits the handler.
async fn check_captcha(state: &AppState, input: &str) -> Option<axum::response::Response> {
    let input = input.trim();
    if input.is_empty() {
        return Some(
            (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::new("Missing captcha")),
            )
                .into_response(),
        );
    }

    match state.captcha().verify(input).await {
        Ok(CaptchaDecision::Passed) => None,
        Ok(CaptchaDecision::Failed) => Some(
            (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::new("Captcha verification failed")),
            )
                .into_response(),
        ),
        Err(err) => {
            error!("Captcha verification unavailable: {err}");
            Some(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(MessageResponse::new("Captcha verification unavailable")),
                )
                    .into_response(),
            )
        }
    }
}

/// Issue a login OTP to an activated authority's email.
#[utoipa::path(
    post,
    path = "/authority/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP issued and queued for delivery", body = MessageResponse),
        (status = 400, description = "Invalid email or failed captcha", body = MessageResponse),
        (status = 404, description = "No account for this email", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "authority"
)]
pub async fn send_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<SendOtpRequest>>,
) -> impl IntoResponse {
    let request: SendOtpRequest = match payload {
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

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::SendOtp)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_identifier(&email, RateLimitAction::SendOtp)
            == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse::new("Rate limited")),
        )
            .into_response();
    }

    if let Some(response) = check_captcha(&state, &request.captcha_text).await {
        return response;
    }

    // OTP login is only for accounts that already exist and are active.
    match storage::lookup_authority(&pool, &email).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(MessageResponse::new("No account for this email")),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to lookup authority for otp: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Failed to send OTP")),
            )
                .into_response();
        }
    }

    let otp = generate_otp();
    match storage::issue_login_otp(&pool, &email, &otp, state.config()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse::new("OTP sent successfully")),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to issue authority login otp: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Failed to send OTP")),
            )
                .into_response()
        }
    }
}

/// Verify a login OTP and return the account summary.
#[utoipa::path(
    post,
    path = "/authority/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP verified; login successful", body = AuthoritySummary),
        (status = 400, description = "Invalid, expired or consumed OTP, or failed captcha", body = MessageResponse),
        (status = 404, description = "Account no longer exists", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "authority"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
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

    let otp = request.otp.trim();
    if otp.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Missing OTP")),
        )
            .into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::VerifyOtp)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_identifier(&email, RateLimitAction::VerifyOtp)
            == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse::new("Rate limited")),
        )
            .into_response();
    }

    if let Some(response) = check_captcha(&state, &request.captcha_input).await {
        return response;
    }

    match storage::consume_login_otp(&pool, &email, otp).await {
        Ok(OtpLoginOutcome::Verified(record)) => (
            StatusCode::OK,
            Json(AuthoritySummary {
                id: record.id.to_string(),
                email: record.email,
                full_name: record.full_name,
                designation: record.designation,
                department: record.department,
            }),
        )
            .into_response(),
        Ok(OtpLoginOutcome::NotFound) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("No OTP requested for this email")),
        )
            .into_response(),
        Ok(OtpLoginOutcome::Expired) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("OTP expired")),
        )
            .into_response(),
        Ok(OtpLoginOutcome::AlreadyConsumed) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("OTP already used")),
        )
            .into_response(),
        Ok(OtpLoginOutcome::Mismatch) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Incorrect OTP")),
        )
            .into_response(),
        Ok(OtpLoginOutcome::AccountMissing) => (
            StatusCode::NOT_FOUND,
            Json(MessageResponse::new("No account for this email")),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to verify authority login otp: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Verification failed")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::rate_limit::NoopRateLimiter;
    use super::super::super::{ActivationConfig, AppState, CaptchaVerifier};
    use super::{SendOtpRequest, VerifyOtpRequest, send_otp, verify_otp};
    use anyhow::Result;
    use axum::Json;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn app_state() -> Arc<AppState> {
        let config = ActivationConfig::new(
            "http://localhost:8080".to_string(),
            "http://localhost:5173".to_string(),
        );
        Arc::new(AppState::new(
            config,
            Arc::new(CaptchaVerifier::accept_all()),
            Arc::new(NoopRateLimiter),
        ))
    }

    #[tokio::test]
    async fn send_otp_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = send_otp(HeaderMap::new(), Extension(pool), Extension(app_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn send_otp_rejects_blank_captcha() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = send_otp(
            HeaderMap::new(),
            Extension(pool),
            Extension(app_state()),
            Some(Json(SendOtpRequest {
                email: "a@x.com".to_string(),
                captcha_text: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_blank_otp() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_otp(
            HeaderMap::new(),
            Extension(pool),
            Extension(app_state()),
            Some(Json(VerifyOtpRequest {
                email: "a@x.com".to_string(),
                otp: "".to_string(),
                captcha_input: "abcd".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
