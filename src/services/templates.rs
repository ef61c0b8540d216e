//! HTML bodies for the transactional emails.

const APP_URL: &str = "https://imagineit.cloud";

pub fn verify_email_html(name: &str, token: &str) -> String {
    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:600px;margin:0 auto;padding:24px">
  <h2 style="color:#4f46e5">Welcome to ImagineIt, {name}!</h2>
  <p>Click the button below to verify your email and activate your account.</p>
  <p style="text-align:center;margin:32px 0">
    <a href="{APP_URL}/verify/{token}"
       style="background:#4f46e5;color:#fff;padding:12px 28px;border-radius:6px;text-decoration:none">
      Verify my email
    </a>
  </p>
  <p style="color:#6b7280;font-size:13px">This link expires in 15 minutes. If you did not sign up, ignore this email.</p>
</div>"#
    )
}

pub fn otp_html(name: &str, otp: &str) -> String {
    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:600px;margin:0 auto;padding:24px">
  <h2 style="color:#4f46e5">Hi {name},</h2>
  <p>Your one-time login code is:</p>
  <p style="text-align:center;font-size:32px;letter-spacing:8px;font-weight:bold;margin:24px 0">{otp}</p>
  <p style="color:#6b7280;font-size:13px">The code expires in 5 minutes. Never share it with anyone.</p>
</div>"#
    )
}

pub fn reset_password_html(name: &str, token: &str) -> String {
    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:600px;margin:0 auto;padding:24px">
  <h2 style="color:#4f46e5">Hi {name},</h2>
  <p>We received a request to reset your password.</p>
  <p style="text-align:center;margin:32px 0">
    <a href="{APP_URL}/reset-password/{token}"
       style="background:#4f46e5;color:#fff;padding:12px 28px;border-radius:6px;text-decoration:none">
      Reset my password
    </a>
  </p>
  <p style="color:#6b7280;font-size:13px">The link expires in 15 minutes. If you did not ask for this, ignore this email.</p>
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_embed_their_inputs() {
        assert!(verify_email_html("Ada", "tok123").contains("/verify/tok123"));
        assert!(otp_html("Ada", "042917").contains("042917"));
        assert!(reset_password_html("Ada", "tok456").contains("/reset-password/tok456"));
    }
}
