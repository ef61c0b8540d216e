//! Order creation and payment-callback verification.
//!
//! The allow-list check runs before any provider call, and the ledger is
//! credited only after the callback signature verifies.

use axum::{extract::State, response::Json, Extension};
use serde_json::{json, Value};
use validator::Validate;

use crate::dtos::payment_dtos::{CreateOrderRequest, VerifyPaymentRequest};
use crate::errors::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::services::razorpay::find_package;
use crate::state::AppState;

/// POST /api/payment/create-order
pub async fn create_order(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let payment = state
        .payment
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("payment service not configured".into()))?;

    let package = find_package(body.amount, body.credits, &body.currency)
        .ok_or_else(|| AppError::invalid_data("Invalid package selected"))?;

    let order = payment.create_order(package, &current.id().to_hex()).await?;
    Ok(Json(json!(order)))
}

/// POST /api/payment/verify-payment — constant-time signature check; a
/// mismatch never touches the ledger.
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let payment = state
        .payment
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("payment service not configured".into()))?;

    payment.verify_signature(
        &body.razorpay_order_id,
        &body.razorpay_payment_id,
        &body.razorpay_signature,
    )?;

    let new_credits = state.ledger.credit(&current.id(), body.credits).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment verified and credits added",
        "newCredits": new_credits,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use crate::services::ledger::test_support::MemoryLedger;
    use crate::services::razorpay::RazorpayService;
    use crate::test_utils::{mock_user, TestStateBuilder};

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn current_user() -> Extension<CurrentUser> {
        Extension(CurrentUser(mock_user("ada@x.com", "hash")))
    }

    #[tokio::test]
    async fn create_order_rejects_tampered_package_before_provider_call() {
        let state = TestStateBuilder::new()
            .build()
            .await
            .with_payment(Arc::new(RazorpayService::new("key".into(), "secret".into())));

        // (99, 999, INR) is off the allow-list; no HTTP request is made,
        // so the unreachable provider never matters.
        let result = create_order(
            State(state),
            current_user(),
            Json(CreateOrderRequest {
                amount: 99.0,
                credits: 999,
                currency: "INR".into(),
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::InvalidData(_))));
    }

    #[tokio::test]
    async fn create_order_without_provider_is_unavailable() {
        let state = TestStateBuilder::new().build().await;
        let result = create_order(
            State(state),
            current_user(),
            Json(CreateOrderRequest {
                amount: 99.0,
                credits: 10,
                currency: "INR".into(),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn verified_payment_credits_the_ledger() {
        let current = current_user();
        let user_id = current.0 .0.id.unwrap();
        let ledger = MemoryLedger::with_balance(user_id, 0);
        let state = TestStateBuilder::new()
            .ledger(ledger.clone())
            .build()
            .await
            .with_payment(Arc::new(RazorpayService::new("key".into(), "secret".into())));

        let response = verify_payment(
            State(state),
            current,
            Json(VerifyPaymentRequest {
                razorpay_order_id: "order_1".into(),
                razorpay_payment_id: "pay_1".into(),
                razorpay_signature: sign("secret", "order_1", "pay_1"),
                credits: 10,
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0["newCredits"], 10);
    }

    #[tokio::test]
    async fn tampered_signature_never_mutates_the_ledger() {
        let current = current_user();
        let user_id = current.0 .0.id.unwrap();
        let ledger = MemoryLedger::with_balance(user_id, 0);
        let state = TestStateBuilder::new()
            .ledger(ledger.clone())
            .build()
            .await
            .with_payment(Arc::new(RazorpayService::new("key".into(), "secret".into())));

        let result = verify_payment(
            State(state),
            current,
            Json(VerifyPaymentRequest {
                razorpay_order_id: "order_1".into(),
                razorpay_payment_id: "pay_1".into(),
                razorpay_signature: sign("wrong-secret", "order_1", "pay_1"),
                credits: 10,
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::InvalidSignature)));
        use crate::services::ledger::CreditLedger;
        assert_eq!(ledger.balance(&user_id).await.unwrap(), 0);
    }
}
