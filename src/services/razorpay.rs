//! Razorpay order creation and callback-signature verification.
//!
//! The (amount, credits, currency) allow-list lives here so a tampered
//! client payload is rejected before any provider call. The callback
//! signature is HMAC-SHA256 over `order_id|payment_id` keyed with the
//! account secret, compared in constant time.

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::info;

use crate::errors::{AppError, Result};

const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditPackage {
    /// Amount in the currency's minor unit (paise, cents).
    pub amount_minor: i64,
    pub credits: i64,
    pub currency: &'static str,
}

/// Server-trusted price table. Anything outside it is tampering.
pub const CREDIT_PACKAGES: &[CreditPackage] = &[
    CreditPackage { amount_minor: 9900, credits: 10, currency: "INR" },
    CreditPackage { amount_minor: 14900, credits: 20, currency: "INR" },
    CreditPackage { amount_minor: 120, credits: 10, currency: "USD" },
    CreditPackage { amount_minor: 180, credits: 20, currency: "USD" },
];

/// Match a client-supplied (amount, credits, currency) triple against the
/// allow-list. `amount` arrives in major units (99 rupees, 1.20 dollars).
pub fn find_package(amount: f64, credits: i64, currency: &str) -> Option<&'static CreditPackage> {
    let amount_minor = (amount * 100.0).round() as i64;
    CREDIT_PACKAGES
        .iter()
        .find(|p| p.amount_minor == amount_minor && p.credits == credits && p.currency == currency)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct RazorpayService {
    key_id: String,
    key_secret: String,
    client: Client,
}

impl RazorpayService {
    pub fn new(key_id: String, key_secret: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        RazorpayService {
            key_id,
            key_secret,
            client,
        }
    }

    /// Create a provider order for an allow-listed package. The receipt and
    /// notes carry the purchasing account so the callback can be tied back.
    pub async fn create_order(
        &self,
        package: &CreditPackage,
        user_id: &str,
    ) -> Result<OrderResponse> {
        let millis = Utc::now().timestamp_millis().to_string();
        let receipt = format!(
            "rcpt_{}_{}",
            &millis[millis.len().saturating_sub(8)..],
            &user_id[user_id.len().saturating_sub(6)..],
        );

        info!(
            "creating order: {} {} -> {} credits",
            package.amount_minor, package.currency, package.credits
        );

        let response = self
            .client
            .post(ORDERS_URL)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": package.amount_minor,
                "currency": package.currency,
                "receipt": receipt,
                "notes": {
                    "userId": user_id,
                    "credits": package.credits,
                },
            }))
            .send()
            .await
            .map_err(|e| AppError::payment(format!("order request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::payment(format!(
                "order creation failed: {} - {}",
                status, body
            )));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| AppError::payment(format!("invalid order response: {}", e)))?;

        info!("order created: {}", order.id);
        Ok(order)
    }

    /// Recompute the callback signature and compare in constant time.
    /// Any mismatch is `InvalidSignature`; the ledger is never touched on
    /// that path.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<()> {
        let payload = format!("{}|{}", order_id, payment_id);

        let mut mac = Hmac::<Sha256>::new_from_slice(self.key_secret.as_bytes())
            .map_err(|_| AppError::configuration("invalid payment secret"))?;
        mac.update(payload.as_bytes());

        let provided = hex::decode(signature).map_err(|_| AppError::InvalidSignature)?;
        mac.verify_slice(&provided)
            .map_err(|_| AppError::InvalidSignature)
    }
}
