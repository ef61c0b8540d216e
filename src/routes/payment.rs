use axum::{middleware::from_fn_with_state, routing::post, Router};

use crate::handlers::payment;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payment::create_order))
        .route("/verify-payment", post(payment::verify_payment))
        .layer(from_fn_with_state(state, auth_middleware))
}
