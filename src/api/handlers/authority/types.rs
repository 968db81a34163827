//! Request/response types for authority endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub email: String,
    pub full_name: String,
    pub designation: String,
    pub department: String,
    pub password: String,
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendOtpRequest {
    pub email: String,
    pub captcha_text: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    pub captcha_input: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account summary returned by the login paths. Never carries the password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthoritySummary {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub designation: String,
    pub department: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn signup_request_round_trips() -> Result<()> {
        let request = SignupRequest {
            email: "a@x.com".to_string(),
            full_name: "Ravi Kumar".to_string(),
            designation: "Engineer".to_string(),
            department: "Public Works".to_string(),
            password: "hunter2hunter2".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "a@x.com");
        let decoded: SignupRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.department, "Public Works");
        Ok(())
    }

    #[test]
    fn authority_summary_has_no_password_field() -> Result<()> {
        let summary = AuthoritySummary {
            id: "00000000-0000-0000-0000-000000000000".to_string(),
            email: "a@x.com".to_string(),
            full_name: "Ravi Kumar".to_string(),
            designation: "Engineer".to_string(),
            department: "Public Works".to_string(),
        };
        let value = serde_json::to_value(&summary)?;
        assert!(value.get("password").is_none());
        assert!(value.get("password_hash").is_none());
        Ok(())
    }
}
