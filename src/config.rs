// config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub redis_url: Option<String>,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub gemini_api_key: Option<String>,
    pub smtp_url: Option<String>,
    pub smtp_from: String,
    /// When the rate-limit store is unreachable, let the request through
    /// instead of rejecting it. Availability over strictness.
    pub rate_limit_fail_open: bool,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "imagineit".to_string()),
            redis_url: env::var("REDIS_URL").ok(),
            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .expect("ACCESS_TOKEN_SECRET must be set"),
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .expect("REFRESH_TOKEN_SECRET must be set"),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID").ok(),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            smtp_url: env::var("SMTP_URL").ok(),
            smtp_from: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "ImagineIt <noreply@imagineit.cloud>".to_string()),
            rate_limit_fail_open: env::var("RATE_LIMIT_FAIL_OPEN")
                .map(|v| v != "false")
                .unwrap_or(true),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5001".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }

    pub fn razorpay_keys(&self) -> Option<(String, String)> {
        match (&self.razorpay_key_id, &self.razorpay_key_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }
}
