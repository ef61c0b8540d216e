// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Validation error: {0}")]
    InvalidData(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid otp")]
    InvalidOtp,

    #[error("Otp expired or invalid")]
    OtpExpired,

    #[error("Invalid or expired token")]
    TokenExpired,

    #[error("Invalid or expired refresh token")]
    InvalidToken,

    #[error("User already exists")]
    AccountExists,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Admin access required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("No image provided")]
    NoImageProvided,

    #[error("Invalid image format")]
    InvalidImageFormat,

    #[error("Multipart error: {0}")]
    Multipart(String),

    #[error("Cloudinary error: {0}")]
    CloudinaryError(String),

    #[error("Payment error: {0}")]
    PaymentError(String),

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Schema validation gets a structured field-error list; everything
        // else gets the generic body so callers cannot probe internals.
        if let AppError::Validation(ref errors) = self {
            let all_errors: Vec<_> = errors
                .field_errors()
                .iter()
                .flat_map(|(field, errs)| {
                    let field = field.to_string();
                    errs.iter().map(move |e| {
                        json!({
                            "field": field,
                            "message": e
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| "validation error".to_string()),
                            "code": e.code,
                        })
                    })
                })
                .collect();

            let message = all_errors
                .first()
                .and_then(|e| e["message"].as_str())
                .unwrap_or("validation error")
                .to_string();

            let body = Json(json!({
                "error": "Validation failed",
                "message": message,
                "errors": all_errors,
                "success": false,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
            AppError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Cache error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            AppError::InvalidData(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later",
            ),
            AppError::InvalidCredentials => (StatusCode::BAD_REQUEST, "Invalid credentials"),
            AppError::InvalidOtp => (StatusCode::BAD_REQUEST, "Invalid otp"),
            AppError::OtpExpired => (StatusCode::BAD_REQUEST, "Otp expired or invalid"),
            AppError::TokenExpired => (StatusCode::BAD_REQUEST, "Invalid or expired token"),
            AppError::InvalidToken => (StatusCode::FORBIDDEN, "Invalid or expired refresh token"),
            AppError::AccountExists => (StatusCode::BAD_REQUEST, "User already exists"),
            AppError::InsufficientCredits => (StatusCode::FORBIDDEN, "Insufficient credits"),
            AppError::InvalidSignature => (StatusCode::BAD_REQUEST, "Invalid signature"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied. Admin only."),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format"),
            AppError::NoImageProvided => (StatusCode::BAD_REQUEST, "No image provided"),
            AppError::InvalidImageFormat => (StatusCode::BAD_REQUEST, "Invalid image format"),
            AppError::Multipart(_) => (StatusCode::BAD_REQUEST, "Invalid multipart data"),
            AppError::CloudinaryError(_) => (StatusCode::BAD_GATEWAY, "Image storage error"),
            AppError::PaymentError(_) => (StatusCode::BAD_GATEWAY, "Payment provider error"),
            AppError::GenerationError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Image generation failed")
            }
            AppError::ExternalApi(_) => (StatusCode::BAD_GATEWAY, "External API error"),
            AppError::ConfigurationError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error")
            }
            AppError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
        };

        // Internal detail stays in the logs, never in the body.
        match &self {
            AppError::MongoDB(_)
            | AppError::Cache(_)
            | AppError::CloudinaryError(_)
            | AppError::PaymentError(_)
            | AppError::GenerationError(_)
            | AppError::ExternalApi(_)
            | AppError::ConfigurationError(_)
            | AppError::ServiceUnavailable(_) => {
                tracing::error!("request failed: {}", self);
            }
            _ => {}
        }

        let message = match &self {
            AppError::InvalidData(msg) => msg.clone(),
            AppError::NotFound(what) => format!("{} not found", what),
            _ => error_message.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "message": message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidData(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::InvalidData(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        AppError::Cache(msg.into())
    }

    pub fn cloudinary(msg: impl Into<String>) -> Self {
        AppError::CloudinaryError(msg.into())
    }

    pub fn payment(msg: impl Into<String>) -> Self {
        AppError::PaymentError(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        AppError::GenerationError(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn cache_error_hides_internal_detail() {
        let err = AppError::Cache("redis://secret-host:6379 connection refused".into());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response_body(response).await;
        assert!(!body["message"].as_str().unwrap().contains("secret-host"));
    }

    #[tokio::test]
    async fn credential_and_otp_errors_share_generic_shape() {
        for err in [AppError::InvalidCredentials, AppError::OtpExpired] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = response_body(response).await;
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn rate_limited_maps_to_429() {
        let response = AppError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn insufficient_credits_is_actionable() {
        let response = AppError::InsufficientCredits.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = response_body(response).await;
        assert_eq!(body["message"], "Insufficient credits");
    }
}
