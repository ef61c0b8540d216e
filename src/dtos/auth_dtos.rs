use serde::Deserialize;
use validator::Validate;

use crate::models::user::Role;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 7, max = 20, message = "Invalid contact number"))]
    pub contact: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(equal = 6, message = "OTP must be 6 digits"))]
    pub otp: String,
}

/// Shared by forgot-password and resend-otp.
#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Body for `POST /reset-password/:token`; the token rides in the path.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rejects_short_password() {
        let req = SignupRequest {
            name: "Ada".into(),
            email: "ada@x.com".into(),
            password: "12345".into(),
            contact: "1234567890".into(),
            role: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn otp_must_be_exactly_six_chars() {
        let ok = VerifyOtpRequest {
            email: "a@x.com".into(),
            otp: "123456".into(),
        };
        assert!(ok.validate().is_ok());

        let short = VerifyOtpRequest {
            email: "a@x.com".into(),
            otp: "12345".into(),
        };
        assert!(short.validate().is_err());
    }
}
