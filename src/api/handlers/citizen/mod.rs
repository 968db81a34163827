//! Citizen self-registration via phone OTP.

pub mod types;

mod storage;

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::secrets::{extract_client_ip, generate_otp, normalize_phone};
use super::{AppState, MessageResponse, valid_phone};
use storage::VerifyOutcome;
use types::{SendOtpRequest, VerifyOtpRequest};

/// Issue a 6-digit OTP for a phone number and queue its SMS delivery.
#[utoipa::path(
    post,
    path = "/citizen/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP issued and queued for delivery", body = MessageResponse),
        (status = 400, description = "Invalid phone number", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "citizen"
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

    let phone_number = normalize_phone(&request.phone_number);
    if !valid_phone(&phone_number) {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Invalid phone number")),
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
            .check_identifier(&phone_number, RateLimitAction::SendOtp)
            == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse::new("Rate limited")),
        )
            .into_response();
    }

    // The OTP travels only via the SMS outbox; the response just confirms issuance.
    let otp = generate_otp();
    match storage::issue_otp(&pool, &phone_number, &otp, state.config()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse::new("OTP sent successfully")),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to issue citizen otp: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Failed to send OTP")),
            )
                .into_response()
        }
    }
}

/// Verify an OTP and register the citizen.
#[utoipa::path(
    post,
    path = "/citizen/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 201, description = "Citizen verified and registered", body = MessageResponse),
        (status = 400, description = "Invalid, expired or consumed OTP, or already registered", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "citizen"
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

    let phone_number = normalize_phone(&request.phone_number);
    if !valid_phone(&phone_number) {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Invalid phone number")),
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

    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Missing full name")),
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
            .check_identifier(&phone_number, RateLimitAction::VerifyOtp)
            == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse::new("Rate limited")),
        )
            .into_response();
    }

    match storage::consume_otp_and_register(&pool, &phone_number, otp, full_name).await {
        Ok(VerifyOutcome::Registered) => (
            StatusCode::CREATED,
            Json(MessageResponse::new(
                "Citizen verified and registered successfully",
            )),
        )
            .into_response(),
        Ok(VerifyOutcome::NotFound) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("No OTP requested for this number")),
        )
            .into_response(),
        Ok(VerifyOutcome::Expired) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("OTP expired")),
        )
            .into_response(),
        Ok(VerifyOutcome::AlreadyConsumed) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("OTP already used")),
        )
            .into_response(),
        Ok(VerifyOutcome::Mismatch) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Incorrect OTP")),
        )
            .into_response(),
        Ok(VerifyOutcome::DuplicateAccount) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Citizen already registered")),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to verify citizen otp: {err}");
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
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::{ActivationConfig, AppState, CaptchaVerifier};
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
    async fn send_otp_rejects_bad_phone() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = send_otp(
            HeaderMap::new(),
            Extension(pool),
            Extension(app_state()),
            Some(Json(SendOtpRequest {
                phone_number: "not-a-number".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_blank_fields() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_otp(
            HeaderMap::new(),
            Extension(pool.clone()),
            Extension(app_state()),
            Some(Json(VerifyOtpRequest {
                phone_number: "9990001111".to_string(),
                otp: " ".to_string(),
                full_name: "Asha".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = verify_otp(
            HeaderMap::new(),
            Extension(pool),
            Extension(app_state()),
            Some(Json(VerifyOtpRequest {
                phone_number: "9990001111".to_string(),
                otp: "123456".to_string(),
                full_name: "".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
