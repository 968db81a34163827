//! # Roadwatch (Account Onboarding Backend)
//!
//! `roadwatch` is the onboarding and authentication backend for a pothole
//! reporting system. It turns an unauthenticated contact identifier (phone
//! number or email) into a verified account record, gated by a short-lived
//! secret and, for municipal authorities, a password credential.
//!
//! ## Actors
//!
//! - **Citizens** register with their phone number: `POST /citizen/send-otp`
//!   issues a 6-digit code, `POST /citizen/verify-otp` consumes it and
//!   promotes the registration into a permanent citizen account.
//! - **Authorities** (municipal staff) sign up with a profile and password,
//!   receive an email verification link, and are promoted on
//!   `GET /authority/verify`. Login is by password, or by a CAPTCHA-gated
//!   email OTP for already-activated accounts.
//!
//! ## Pending secrets
//!
//! Every secret is stored hashed, keyed by its identifier with upsert
//! semantics: at most one active secret per identifier, and re-issuing
//! supersedes the prior one. Consumption and account promotion run in a
//! single transaction so concurrent verification attempts cannot create
//! duplicate accounts.
//!
//! Secrets are delivered out-of-band through a transactional `message_outbox`
//! drained by a background worker; delivery failures are retried with backoff
//! and never fail the issuing request.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
