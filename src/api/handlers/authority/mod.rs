//! Authority (municipal staff) onboarding and login.
//!
//! Activation is by email verification link: signup stages the profile with a
//! hashed password and a token, and `GET /authority/verify` promotes it.
//! Login is by password, or by a CAPTCHA-gated email OTP for accounts that
//! are already active.

pub mod login;
pub mod otp;
pub mod signup;
pub mod types;
pub mod verify;

mod storage;
