use serde::Deserialize;
use validator::Validate;

fn default_currency() -> String {
    "INR".to_string()
}

/// Order creation payload. `amount` arrives in major currency units and is
/// checked against the server-side package allow-list, never trusted.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(range(min = 0.01, message = "Amount must be positive"))]
    pub amount: f64,
    #[validate(range(min = 1, message = "Credits must be positive"))]
    pub credits: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "Order id is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "Payment id is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "Signature is required"))]
    pub razorpay_signature: String,
    #[validate(range(min = 1, message = "Credits must be positive"))]
    pub credits: i64,
}
