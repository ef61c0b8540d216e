use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, post},
    Router,
};

use crate::handlers::admin;
use crate::middleware::auth::{admin_middleware, auth_middleware};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/assets", post(admin::create_asset).get(admin::list_assets))
        .route("/assets/:id", delete(admin::delete_asset))
        .route("/extract-prompt", post(admin::extract_prompt))
        .route("/community/:id", delete(admin::delete_community_post))
        // admin gate runs after authentication
        .layer(from_fn(admin_middleware))
        .layer(from_fn_with_state(state, auth_middleware))
}
