//! Email verification link: consume the token and promote the staging row.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::super::secrets::extract_client_ip;
use super::super::{AppState, MessageResponse};
use super::storage::{self, PromoteOutcome};
use super::types::VerifyQuery;

/// Verify the emailed link and activate the authority account.
#[utoipa::path(
    get,
    path = "/authority/verify",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Email verified; account active", body = MessageResponse),
        (status = 400, description = "Invalid or expired verification link", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "authority"
)]
pub async fn verify(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    query: Query<VerifyQuery>,
) -> impl IntoResponse {
    let token = query.token.trim();
    if token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Missing token")),
        )
            .into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::VerifyEmail)
        == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse::new("Rate limited")),
        )
            .into_response();
    }

    match storage::consume_token_and_promote(&pool, token).await {
        Ok(PromoteOutcome::Promoted) => (
            StatusCode::OK,
            Json(MessageResponse::new(
                "Email verified successfully. You can now log in.",
            )),
        )
            .into_response(),
        Ok(PromoteOutcome::NotFound) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Invalid verification link")),
        )
            .into_response(),
        Ok(PromoteOutcome::Expired) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Verification link expired")),
        )
            .into_response(),
        Ok(PromoteOutcome::DuplicateAccount) => (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("Account already active")),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to verify authority email: {err}");
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
    use super::{VerifyQuery, verify};
    use anyhow::Result;
    use axum::extract::{Extension, Query};
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
    async fn verify_rejects_blank_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify(
            HeaderMap::new(),
            Extension(pool),
            Extension(app_state()),
            Query(VerifyQuery {
                token: "  ".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
