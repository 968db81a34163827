//! Database helpers for authority staging, promotion, OTP login and lookup.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::super::secrets::{build_verify_url, hash_secret, is_unique_violation};
use super::super::state::ActivationConfig;
use crate::api::outbox::{Channel, enqueue_message};

/// Outcome when staging a new signup.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created,
    AlreadyPending,
    AccountExists,
}

/// Outcome when consuming a verification token.
#[derive(Debug)]
pub(super) enum PromoteOutcome {
    Promoted,
    NotFound,
    Expired,
    DuplicateAccount,
}

/// Outcome when consuming a login OTP.
#[derive(Debug)]
pub(super) enum OtpLoginOutcome {
    Verified(AuthorityRecord),
    NotFound,
    Expired,
    AlreadyConsumed,
    Mismatch,
    AccountMissing,
}

/// Full authority row; the password hash stays inside the storage layer.
#[derive(Debug)]
pub(super) struct AuthorityRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) full_name: String,
    pub(super) designation: String,
    pub(super) department: String,
    pub(super) password_hash: String,
}

fn authority_record(row: &sqlx::postgres::PgRow) -> AuthorityRecord {
    AuthorityRecord {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        designation: row.get("designation"),
        department: row.get("department"),
        password_hash: row.get("password_hash"),
    }
}

/// Stage a signup: insert the profile + hashed password + token hash, and
/// enqueue the verification email, all in one transaction.
pub(super) async fn stage_signup(
    pool: &PgPool,
    email: &str,
    full_name: &str,
    designation: &str,
    department: &str,
    password_hash: &str,
    token: &str,
    config: &ActivationConfig,
) -> Result<SignupOutcome> {
    let mut tx = pool.begin().await.context("begin signup transaction")?;

    let query = "SELECT EXISTS(SELECT 1 FROM authorities WHERE email = $1) AS active";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to check for active authority")?;
    if row.get::<bool, _>("active") {
        let _ = tx.rollback().await;
        return Ok(SignupOutcome::AccountExists);
    }

    let query = r"
        INSERT INTO authority_verifications
            (email, full_name, designation, department, password_hash, token_hash, issued_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW() + ($7 * INTERVAL '1 second'))
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(email)
        .bind(full_name)
        .bind(designation)
        .bind(department)
        .bind(password_hash)
        .bind(hash_secret(token))
        .bind(config.verify_token_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await;

    if let Err(err) = inserted {
        if is_unique_violation(&err) {
            let _ = tx.rollback().await;
            return Ok(SignupOutcome::AlreadyPending);
        }
        return Err(err).context("failed to insert authority verification");
    }

    let verify_url = build_verify_url(config.public_base_url(), token);
    let payload = json!({
        "email": email,
        "verify_url": verify_url,
    });
    enqueue_message(&mut tx, Channel::Email, email, "authority_verify", &payload).await?;

    tx.commit().await.context("commit signup transaction")?;
    Ok(SignupOutcome::Created)
}

/// Consume a verification token and promote the staging row into `authorities`.
///
/// The staging row is hard-deleted on success, so a replayed token fails
/// `NotFound`. Expired rows are left in place for lazy cleanup so the caller
/// can distinguish `Expired` from `NotFound`.
pub(super) async fn consume_token_and_promote(
    pool: &PgPool,
    token: &str,
) -> Result<PromoteOutcome> {
    let token_hash = hash_secret(token);
    let mut tx = pool.begin().await.context("begin verify transaction")?;

    // Row lock serializes concurrent verification attempts for the same token.
    let query = r"
        SELECT email, full_name, designation, department, password_hash,
               expires_at <= NOW() AS expired
        FROM authority_verifications
        WHERE token_hash = $1
        FOR UPDATE
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup authority verification")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(PromoteOutcome::NotFound);
    };

    if row.get::<bool, _>("expired") {
        let _ = tx.rollback().await;
        return Ok(PromoteOutcome::Expired);
    }

    let query = "DELETE FROM authority_verifications WHERE token_hash = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(&token_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete authority verification")?;

    let query = r"
        INSERT INTO authorities (email, full_name, designation, department, password_hash)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(row.get::<String, _>("email"))
        .bind(row.get::<String, _>("full_name"))
        .bind(row.get::<String, _>("designation"))
        .bind(row.get::<String, _>("department"))
        .bind(row.get::<String, _>("password_hash"))
        .execute(&mut *tx)
        .instrument(span)
        .await;

    match inserted {
        Ok(_) => {
            tx.commit().await.context("commit verify transaction")?;
            Ok(PromoteOutcome::Promoted)
        }
        Err(err) if is_unique_violation(&err) => {
            let _ = tx.rollback().await;
            Ok(PromoteOutcome::DuplicateAccount)
        }
        Err(err) => {
            let _ = tx.rollback().await;
            Err(err).context("failed to insert authority")
        }
    }
}

/// Look up an authority by email (login paths).
pub(super) async fn lookup_authority(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AuthorityRecord>> {
    let query = r"
        SELECT id, email, full_name, designation, department, password_hash
        FROM authorities
        WHERE email = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup authority")?;
    Ok(row.as_ref().map(authority_record))
}

/// Upsert the pending login OTP for an authority and enqueue its email delivery.
pub(super) async fn issue_login_otp(
    pool: &PgPool,
    email: &str,
    otp: &str,
    config: &ActivationConfig,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin send-otp transaction")?;

    let query = r"
        INSERT INTO authority_login_otps (email, otp_hash, issued_at, expires_at, consumed_at)
        VALUES ($1, $2, NOW(), NOW() + ($3 * INTERVAL '1 second'), NULL)
        ON CONFLICT (email) DO UPDATE
        SET otp_hash = EXCLUDED.otp_hash,
            issued_at = EXCLUDED.issued_at,
            expires_at = EXCLUDED.expires_at,
            consumed_at = NULL
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(hash_secret(otp))
        .bind(config.otp_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to upsert authority login otp")?;

    let payload = json!({
        "email": email,
        "otp": otp,
    });
    enqueue_message(&mut tx, Channel::Email, email, "authority_login_otp", &payload).await?;

    tx.commit().await.context("commit send-otp transaction")?;
    Ok(())
}

/// Consume a login OTP and return the account summary data.
pub(super) async fn consume_login_otp(
    pool: &PgPool,
    email: &str,
    otp: &str,
) -> Result<OtpLoginOutcome> {
    let mut tx = pool.begin().await.context("begin verify-otp transaction")?;

    let query = r"
        SELECT otp_hash,
               expires_at <= NOW() AS expired,
               consumed_at IS NOT NULL AS consumed
        FROM authority_login_otps
        WHERE email = $1
        FOR UPDATE
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup authority login otp")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(OtpLoginOutcome::NotFound);
    };

    if row.get::<bool, _>("expired") {
        let _ = tx.rollback().await;
        return Ok(OtpLoginOutcome::Expired);
    }
    if row.get::<bool, _>("consumed") {
        let _ = tx.rollback().await;
        return Ok(OtpLoginOutcome::AlreadyConsumed);
    }
    let stored_hash: Vec<u8> = row.get("otp_hash");
    if stored_hash != hash_secret(otp) {
        let _ = tx.rollback().await;
        return Ok(OtpLoginOutcome::Mismatch);
    }

    let query = "UPDATE authority_login_otps SET consumed_at = NOW() WHERE email = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume authority login otp")?;

    let query = r"
        SELECT id, email, full_name, designation, department, password_hash
        FROM authorities
        WHERE email = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let account = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load authority for otp login")?;

    let Some(account) = account else {
        // Account deleted between issuance and verification.
        let _ = tx.rollback().await;
        return Ok(OtpLoginOutcome::AccountMissing);
    };

    let record = authority_record(&account);
    tx.commit().await.context("commit verify-otp transaction")?;
    Ok(OtpLoginOutcome::Verified(record))
}

#[cfg(test)]
mod tests {
    use super::{OtpLoginOutcome, PromoteOutcome, SignupOutcome};

    #[test]
    fn signup_outcome_debug_names() {
        assert_eq!(format!("{:?}", SignupOutcome::Created), "Created");
        assert_eq!(
            format!("{:?}", SignupOutcome::AlreadyPending),
            "AlreadyPending"
        );
        assert_eq!(
            format!("{:?}", SignupOutcome::AccountExists),
            "AccountExists"
        );
    }

    #[test]
    fn promote_outcome_debug_names() {
        assert_eq!(format!("{:?}", PromoteOutcome::Promoted), "Promoted");
        assert_eq!(format!("{:?}", PromoteOutcome::NotFound), "NotFound");
        assert_eq!(format!("{:?}", PromoteOutcome::Expired), "Expired");
        assert_eq!(
            format!("{:?}", PromoteOutcome::DuplicateAccount),
            "DuplicateAccount"
        );
    }

    #[test]
    fn otp_login_outcome_debug_names() {
        assert_eq!(format!("{:?}", OtpLoginOutcome::NotFound), "NotFound");
        assert_eq!(
            format!("{:?}", OtpLoginOutcome::AccountMissing),
            "AccountMissing"
        );
    }
}
