use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::get_profile).put(auth::update_profile))
        .layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/signup", post(auth::signup))
        .route("/verify/:token", get(auth::verify))
        .route("/login", post(auth::login))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/resend-otp", post(auth::resend_otp))
        .route("/refresh", post(auth::refresh_access_token))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/:token", post(auth::reset_password))
        .merge(protected)
}
