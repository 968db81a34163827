use crate::api;
use anyhow::Result;
use std::sync::Arc;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub public_base_url: String,
    pub frontend_origin: String,
    pub otp_ttl_seconds: i64,
    pub verify_token_ttl_seconds: i64,
    pub captcha_verify_url: Option<String>,
    pub outbox_poll_seconds: u64,
    pub outbox_batch_size: usize,
    pub outbox_max_attempts: u32,
    pub outbox_backoff_base_seconds: u64,
    pub outbox_backoff_max_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the CAPTCHA verifier cannot be built or the server
/// fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let captcha = match args.captcha_verify_url {
        Some(url) => Arc::new(api::handlers::CaptchaVerifier::new_remote(url)?),
        None => Arc::new(api::handlers::CaptchaVerifier::accept_all()),
    };

    let config =
        api::handlers::ActivationConfig::new(args.public_base_url, args.frontend_origin)
            .with_otp_ttl_seconds(args.otp_ttl_seconds)
            .with_verify_token_ttl_seconds(args.verify_token_ttl_seconds);

    let outbox_config = api::outbox::OutboxWorkerConfig::new()
        .with_poll_interval_seconds(args.outbox_poll_seconds)
        .with_batch_size(args.outbox_batch_size)
        .with_max_attempts(args.outbox_max_attempts)
        .with_backoff_base_seconds(args.outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.outbox_backoff_max_seconds);

    api::new(args.port, args.dsn, captcha, config, outbox_config).await
}
