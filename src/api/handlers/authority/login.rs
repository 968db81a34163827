//! Password login for activated authority accounts.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::super::password::{equalize_missing_account, verify_password};
use super::super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::super::secrets::{extract_client_ip, normalize_email};
use super::super::{AppState, MessageResponse};
use super::storage;
use super::types::{AuthoritySummary, LoginRequest};

// One response for unknown email and wrong password, so neither the status
// nor the body leaks which one failed.
fn invalid_credentials() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(MessageResponse::new("Invalid email or password")),
    )
        .into_response()
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/authority/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthoritySummary),
        (status = 401, description = "Invalid credentials", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "authority"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
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

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_identifier(&email, RateLimitAction::Login)
            == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse::new("Rate limited")),
        )
            .into_response();
    }

    let record = match storage::lookup_authority(&pool, &email).await {
        Ok(record) => record,
        Err(err) => {
            error!("Failed to lookup authority for login: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Login failed")),
            )
                .into_response();
        }
    };

    let Some(record) = record else {
        equalize_missing_account(&request.password);
        return invalid_credentials();
    };

    if !verify_password(&request.password, &record.password_hash) {
        return invalid_credentials();
    }

    (
        StatusCode::OK,
        Json(AuthoritySummary {
            id: record.id.to_string(),
            email: record.email,
            full_name: record.full_name,
            designation: record.designation,
            department: record.department,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::super::super::rate_limit::NoopRateLimiter;
    use super::super::super::{ActivationConfig, AppState, CaptchaVerifier};
    use super::{invalid_credentials, login};
    use anyhow::Result;
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
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(HeaderMap::new(), Extension(pool), Extension(app_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[test]
    fn invalid_credentials_is_401() {
        let response = invalid_credentials();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
