//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let public_base_url = matches
        .get_one::<String>("public-base-url")
        .cloned()
        .context("missing required argument: --public-base-url")?;
    let frontend_origin = matches
        .get_one::<String>("frontend-origin")
        .cloned()
        .context("missing required argument: --frontend-origin")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        public_base_url,
        frontend_origin,
        otp_ttl_seconds: matches
            .get_one::<i64>("otp-ttl-seconds")
            .copied()
            .unwrap_or(300),
        verify_token_ttl_seconds: matches
            .get_one::<i64>("verify-token-ttl-seconds")
            .copied()
            .unwrap_or(86_400),
        captcha_verify_url: matches.get_one::<String>("captcha-verify-url").cloned(),
        outbox_poll_seconds: matches
            .get_one::<u64>("outbox-poll-seconds")
            .copied()
            .unwrap_or(5),
        outbox_batch_size: matches
            .get_one::<usize>("outbox-batch-size")
            .copied()
            .unwrap_or(10),
        outbox_max_attempts: matches
            .get_one::<u32>("outbox-max-attempts")
            .copied()
            .unwrap_or(5),
        outbox_backoff_base_seconds: matches
            .get_one::<u64>("outbox-backoff-base-seconds")
            .copied()
            .unwrap_or(5),
        outbox_backoff_max_seconds: matches
            .get_one::<u64>("outbox-backoff-max-seconds")
            .copied()
            .unwrap_or(300),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn server_args_from_flags() -> Result<()> {
        temp_env::with_vars([("ROADWATCH_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "roadwatch",
                "--dsn",
                "postgres://user@localhost:5432/roadwatch",
                "--public-base-url",
                "https://api.roadwatch.dev",
                "--otp-ttl-seconds",
                "120",
                "--captcha-verify-url",
                "https://captcha.example.test/verify",
            ]);
            let Action::Server(args) = handler(&matches)?;
            assert_eq!(args.port, 8080);
            assert_eq!(args.dsn, "postgres://user@localhost:5432/roadwatch");
            assert_eq!(args.public_base_url, "https://api.roadwatch.dev");
            assert_eq!(args.frontend_origin, "http://localhost:5173");
            assert_eq!(args.otp_ttl_seconds, 120);
            assert_eq!(args.verify_token_ttl_seconds, 86_400);
            assert_eq!(
                args.captcha_verify_url.as_deref(),
                Some("https://captcha.example.test/verify")
            );
            assert_eq!(args.outbox_poll_seconds, 5);
            assert_eq!(args.outbox_batch_size, 10);
            Ok(())
        })
    }

    #[test]
    fn captcha_url_defaults_to_none() -> Result<()> {
        temp_env::with_vars([("ROADWATCH_CAPTCHA_VERIFY_URL", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "roadwatch",
                "--dsn",
                "postgres://user@localhost:5432/roadwatch",
            ]);
            let Action::Server(args) = handler(&matches)?;
            assert_eq!(args.captcha_verify_url, None);
            Ok(())
        })
    }
}
