use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use mongodb::bson::oid::ObjectId;

use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// The authenticated account, inserted into request extensions by
/// `auth_middleware` and read back with `Extension<CurrentUser>`.
#[derive(Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> ObjectId {
        self.0.id.unwrap_or_default()
    }
}

/// Bearer token → claims → account lookup. A valid token for a deleted
/// account is still unauthorized.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = state.tokens.verify_access_token(token)?;
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    let user = state
        .users
        .find_by_id(&user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Layered after `auth_middleware` on admin routes.
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;

    if !user.0.is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
