//! Activation configuration and shared per-process state.

use std::sync::Arc;

use super::CaptchaVerifier;
use super::rate_limit::RateLimiter;

const DEFAULT_OTP_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_VERIFY_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct ActivationConfig {
    public_base_url: String,
    frontend_origin: String,
    otp_ttl_seconds: i64,
    verify_token_ttl_seconds: i64,
}

impl ActivationConfig {
    #[must_use]
    pub fn new(public_base_url: String, frontend_origin: String) -> Self {
        Self {
            public_base_url,
            frontend_origin,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            verify_token_ttl_seconds: DEFAULT_VERIFY_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verify_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verify_token_ttl_seconds = seconds;
        self
    }

    pub(crate) fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub(crate) fn frontend_origin(&self) -> &str {
        &self.frontend_origin
    }

    pub(crate) fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    pub(crate) fn verify_token_ttl_seconds(&self) -> i64 {
        self.verify_token_ttl_seconds
    }
}

pub struct AppState {
    config: ActivationConfig,
    captcha: Arc<CaptchaVerifier>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn new(
        config: ActivationConfig,
        captcha: Arc<CaptchaVerifier>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            captcha,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    #[must_use]
    pub fn captcha(&self) -> &CaptchaVerifier {
        &self.captcha
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
