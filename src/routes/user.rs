use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::handlers::generation;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/analyze-pose", post(generation::analyze_pose))
        .route("/generate-edit", post(generation::generate_edit))
        .route("/generate-edit-lite", post(generation::generate_edit_lite))
        .route("/credits", get(generation::get_credits))
        .layer(from_fn_with_state(state, auth_middleware));

    // The community feed is public.
    Router::new()
        .route("/community", get(generation::community_feed))
        .merge(protected)
}
