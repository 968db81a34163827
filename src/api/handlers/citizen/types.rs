//! Request types for citizen endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendOtpRequest {
    pub phone_number: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub otp: String,
    pub full_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn send_otp_request_round_trips() -> Result<()> {
        let request = SendOtpRequest {
            phone_number: "9990001111".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let phone = value
            .get("phone_number")
            .and_then(serde_json::Value::as_str)
            .context("missing phone_number")?;
        assert_eq!(phone, "9990001111");
        let decoded: SendOtpRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.phone_number, "9990001111");
        Ok(())
    }

    #[test]
    fn verify_otp_request_round_trips() -> Result<()> {
        let request = VerifyOtpRequest {
            phone_number: "9990001111".to_string(),
            otp: "123456".to_string(),
            full_name: "Asha".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: VerifyOtpRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.otp, "123456");
        assert_eq!(decoded.full_name, "Asha");
        Ok(())
    }
}
