use axum::{routing::post, Router};

use crate::handlers::forms;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/proposal", post(forms::submit_proposal))
        .route("/subscribe", post(forms::subscribe))
}

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/", post(forms::submit_contact))
}
