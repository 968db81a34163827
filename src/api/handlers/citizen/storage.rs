//! Database helpers for the citizen OTP lifecycle.
//!
//! Issuance upserts the pending OTP (superseding any prior active one) and
//! enqueues its SMS delivery in one transaction. Verification consumes the
//! OTP and promotes the registration into `citizens` in one transaction, so
//! concurrent verifiers cannot both win.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{Instrument, info_span};

use super::super::secrets::{hash_secret, is_unique_violation};
use super::super::state::ActivationConfig;
use crate::api::outbox::{Channel, enqueue_message};

/// Outcome of a verify-and-promote attempt.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum VerifyOutcome {
    Registered,
    NotFound,
    Expired,
    AlreadyConsumed,
    Mismatch,
    DuplicateAccount,
}

/// Upsert the pending OTP for a phone number and enqueue its SMS delivery.
///
/// Re-issuing supersedes the prior secret: the hash, expiry and consumed
/// marker are all reset.
pub(super) async fn issue_otp(
    pool: &PgPool,
    phone_number: &str,
    otp: &str,
    config: &ActivationConfig,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin send-otp transaction")?;

    let query = r"
        INSERT INTO citizen_otps (phone_number, otp_hash, issued_at, expires_at, consumed_at)
        VALUES ($1, $2, NOW(), NOW() + ($3 * INTERVAL '1 second'), NULL)
        ON CONFLICT (phone_number) DO UPDATE
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
        .bind(phone_number)
        .bind(hash_secret(otp))
        .bind(config.otp_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to upsert citizen otp")?;

    let payload = json!({
        "phone_number": phone_number,
        "otp": otp,
    });
    enqueue_message(&mut tx, Channel::Sms, phone_number, "citizen_otp", &payload).await?;

    tx.commit().await.context("commit send-otp transaction")?;
    Ok(())
}

/// Consume a pending OTP and promote the registration into `citizens`.
///
/// The consume-mark and the insert are one atomic unit: any failure after
/// consumption begins rolls both back.
pub(super) async fn consume_otp_and_register(
    pool: &PgPool,
    phone_number: &str,
    otp: &str,
    full_name: &str,
) -> Result<VerifyOutcome> {
    let mut tx = pool.begin().await.context("begin verify-otp transaction")?;

    // Row lock serializes concurrent verification attempts for the same phone.
    let query = r"
        SELECT otp_hash,
               expires_at <= NOW() AS expired,
               consumed_at IS NOT NULL AS consumed
        FROM citizen_otps
        WHERE phone_number = $1
        FOR UPDATE
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(phone_number)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup citizen otp")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(VerifyOutcome::NotFound);
    };

    if row.get::<bool, _>("expired") {
        let _ = tx.rollback().await;
        return Ok(VerifyOutcome::Expired);
    }
    if row.get::<bool, _>("consumed") {
        let _ = tx.rollback().await;
        return Ok(VerifyOutcome::AlreadyConsumed);
    }
    let stored_hash: Vec<u8> = row.get("otp_hash");
    if stored_hash != hash_secret(otp) {
        let _ = tx.rollback().await;
        return Ok(VerifyOutcome::Mismatch);
    }

    // Soft-consume: the row is kept so a replayed OTP fails AlreadyConsumed.
    let query = "UPDATE citizen_otps SET consumed_at = NOW() WHERE phone_number = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(phone_number)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume citizen otp")?;

    let query = "INSERT INTO citizens (full_name, phone_number) VALUES ($1, $2)";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(full_name)
        .bind(phone_number)
        .execute(&mut *tx)
        .instrument(span)
        .await;

    match inserted {
        Ok(_) => {
            tx.commit().await.context("commit verify-otp transaction")?;
            Ok(VerifyOutcome::Registered)
        }
        Err(err) if is_unique_violation(&err) => {
            let _ = tx.rollback().await;
            Ok(VerifyOutcome::DuplicateAccount)
        }
        Err(err) => {
            let _ = tx.rollback().await;
            Err(err).context("failed to insert citizen")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::VerifyOutcome;

    #[test]
    fn verify_outcome_debug_names() {
        assert_eq!(format!("{:?}", VerifyOutcome::Registered), "Registered");
        assert_eq!(format!("{:?}", VerifyOutcome::NotFound), "NotFound");
        assert_eq!(format!("{:?}", VerifyOutcome::Expired), "Expired");
        assert_eq!(
            format!("{:?}", VerifyOutcome::AlreadyConsumed),
            "AlreadyConsumed"
        );
        assert_eq!(format!("{:?}", VerifyOutcome::Mismatch), "Mismatch");
        assert_eq!(
            format!("{:?}", VerifyOutcome::DuplicateAccount),
            "DuplicateAccount"
        );
    }
}
