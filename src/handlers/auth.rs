//! Signup → email verification → login → OTP → token flows, plus profile.
//!
//! No account document exists until the verification link is clicked;
//! everything before that lives in the ephemeral store. Login never
//! returns a session, only an emailed OTP; `verify_otp` is the only place
//! tokens are issued.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Multipart, Path, State},
    http::HeaderMap,
    response::Json,
    Extension,
};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::{json, Value};
use tracing::warn;
use validator::Validate;

use crate::dtos::auth_dtos::{
    EmailRequest, LoginRequest, RefreshRequest, ResetPasswordRequest, SignupRequest,
    VerifyOtpRequest,
};
use crate::errors::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::user::{PendingRegistration, User, UserResponse};
use crate::repos::users::ProfileUpdate;
use crate::services::cloudinary::AVATARS_FOLDER;
use crate::services::templates;
use crate::services::tokens::{generate_otp, generate_secure_token};
use crate::state::AppState;

const BCRYPT_COST: u32 = 10;

const VERIFY_TTL_SECS: u64 = 900;
const OTP_TTL_SECS: u64 = 300;
const RESET_TTL_SECS: u64 = 900;
const RATE_LIMIT_TTL_SECS: u64 = 60;

fn verify_key(token: &str) -> String {
    format!("verify:{}", token)
}

fn verify_email_key(email: &str) -> String {
    format!("verify:email:{}", email)
}

fn otp_key(email: &str) -> String {
    format!("otp:{}", email)
}

fn reset_key(token: &str) -> String {
    format!("reset_password:{}", token)
}

/// First hop of `x-forwarded-for` when present, else the socket peer.
pub fn client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}

/// Presence check on the rate-limit marker. A broken store fails open
/// when configured to, so an outage never locks everyone out.
async fn rate_limited(state: &AppState, key: &str) -> Result<bool> {
    match state.cache.get(key).await {
        Ok(marker) => Ok(marker.is_some()),
        Err(e) if state.config.rate_limit_fail_open => {
            warn!("rate-limit store unavailable, allowing request: {}", e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn mark_rate_limit(state: &AppState, key: &str) {
    if let Err(e) = state.cache.set_ex(key, "true", RATE_LIMIT_TTL_SECS).await {
        warn!("failed to set rate-limit marker: {}", e);
    }
}

fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AppError::configuration(format!("password hashing failed: {}", e)))
}

/// POST /api/auth/signup — park the registration in the ephemeral store
/// and email a verification link. Nothing touches the users collection.
pub async fn signup(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<SignupRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let ip = client_ip(&headers, &addr);
    let rate_key = format!("signup-rate-limiting:{}:{}", ip, body.email);
    if rate_limited(&state, &rate_key).await? {
        return Err(AppError::RateLimited);
    }

    if state.users.find_by_email(&body.email).await?.is_some() {
        return Err(AppError::AccountExists);
    }

    let pending = PendingRegistration {
        name: body.name,
        email: body.email.clone(),
        password: hash_password(&body.password)?,
        contact: body.contact,
        role: body.role.unwrap_or_default(),
    };

    // A re-signup invalidates the previous link; one pending registration
    // per email.
    let email_key = verify_email_key(&pending.email);
    if let Some(old_token) = state.cache.get(&email_key).await? {
        state.cache.del(&verify_key(&old_token)).await?;
    }

    let token = generate_secure_token();
    let payload = serde_json::to_string(&pending)?;
    state
        .cache
        .set_ex(&verify_key(&token), &payload, VERIFY_TTL_SECS)
        .await?;
    state.cache.set_ex(&email_key, &token, VERIFY_TTL_SECS).await?;

    state.mail.enqueue(
        &pending.email,
        "Verify your email",
        templates::verify_email_html(&pending.name, &token),
    );
    mark_rate_limit(&state, &rate_key).await;

    Ok(Json(json!({
        "message": "If your email is valid, a verification link has been sent to it",
        "success": true,
    })))
}

/// GET /api/auth/verify/:token — consume the pending registration and
/// create the account. A replayed token fails as expired.
pub async fn verify(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>> {
    let payload = state
        .cache
        .get(&verify_key(&token))
        .await?
        .ok_or(AppError::TokenExpired)?;
    let pending: PendingRegistration = serde_json::from_str(&payload)?;

    if state.users.find_by_email(&pending.email).await?.is_some() {
        return Err(AppError::AccountExists);
    }

    let user = User {
        id: None,
        name: pending.name,
        email: pending.email.clone(),
        password: pending.password,
        contact: pending.contact,
        role: pending.role,
        credits: 0,
        address: None,
        city: None,
        country: None,
        profile_image: None,
        created_at: DateTime::now(),
    };
    let id = state.users.create(user.clone()).await?;

    state.cache.del(&verify_key(&token)).await?;
    state.cache.del(&verify_email_key(&pending.email)).await?;

    Ok(Json(json!({
        "message": "Email verified, account created",
        "success": true,
        "user": {
            "_id": id.to_hex(),
            "name": user.name,
            "email": user.email,
            "contact": user.contact,
            "role": user.role,
        },
    })))
}

/// POST /api/auth/login — check credentials, then email an OTP instead of
/// issuing any token.
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let ip = client_ip(&headers, &addr);
    let rate_key = format!("login-rate-limit:{}:{}", ip, body.email);
    if rate_limited(&state, &rate_key).await? {
        return Err(AppError::RateLimited);
    }

    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let matches = bcrypt::verify(&body.password, &user.password)
        .map_err(|_| AppError::InvalidCredentials)?;
    if !matches {
        return Err(AppError::InvalidCredentials);
    }

    let otp = generate_otp();
    state
        .cache
        .set_ex(&otp_key(&body.email), &otp, OTP_TTL_SECS)
        .await?;

    state.mail.enqueue(
        &body.email,
        "Your login code",
        templates::otp_html(&user.name, &otp),
    );
    mark_rate_limit(&state, &rate_key).await;

    Ok(Json(json!({
        "message": "If your email and password are correct, an OTP has been sent to your email",
        "success": true,
    })))
}

/// POST /api/auth/verify-otp — the only place tokens are issued. The OTP
/// survives a mismatch and is deleted only on success.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let stored = state
        .cache
        .get(&otp_key(&body.email))
        .await?
        .ok_or(AppError::OtpExpired)?;

    if stored != body.otp {
        return Err(AppError::InvalidOtp);
    }
    state.cache.del(&otp_key(&body.email)).await?;

    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let user_id = user.id.ok_or(AppError::NotFound("user"))?;

    let (access_token, refresh_token) = state.tokens.generate_token_pair(&user_id.to_hex()).await?;

    Ok(Json(json!({
        "message": "Login successful",
        "success": true,
        "accessToken": access_token,
        "refreshToken": refresh_token,
        "user": UserResponse::from(user),
    })))
}

/// POST /api/auth/resend-otp
pub async fn resend_otp(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<EmailRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let ip = client_ip(&headers, &addr);
    let rate_key = format!("login-rate-limit:{}:{}", ip, body.email);
    if rate_limited(&state, &rate_key).await? {
        return Err(AppError::RateLimited);
    }

    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let otp = generate_otp();
    state
        .cache
        .set_ex(&otp_key(&body.email), &otp, OTP_TTL_SECS)
        .await?;

    state.mail.enqueue(
        &body.email,
        "Your login code",
        templates::otp_html(&user.name, &otp),
    );
    mark_rate_limit(&state, &rate_key).await;

    Ok(Json(json!({
        "message": "OTP resent successfully",
        "success": true,
    })))
}

/// POST /api/auth/refresh
pub async fn refresh_access_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let claims = state.tokens.verify_refresh_token(&body.refresh_token).await?;
    let access_token = state.tokens.generate_access_token(&claims.sub)?;

    Ok(Json(json!({
        "message": "Access token refreshed successfully",
        "success": true,
        "accessToken": access_token,
    })))
}

/// POST /api/auth/logout — drops the tracked refresh token; the access
/// token simply ages out.
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>> {
    state
        .tokens
        .revoke_refresh_token(&current.id().to_hex())
        .await?;

    Ok(Json(json!({
        "message": "Logged out successfully",
        "success": true,
    })))
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let user_id = user.id.ok_or(AppError::NotFound("user"))?;

    let token = generate_secure_token();
    state
        .cache
        .set_ex(&reset_key(&token), &user_id.to_hex(), RESET_TTL_SECS)
        .await?;

    state.mail.enqueue(
        &body.email,
        "Reset your password",
        templates::reset_password_html(&user.name, &token),
    );

    Ok(Json(json!({
        "message": "Password reset link sent to your email",
        "success": true,
    })))
}

/// POST /api/auth/reset-password/:token — single use; the token is
/// deleted once the new hash is written.
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let user_id_hex = state
        .cache
        .get(&reset_key(&token))
        .await?
        .ok_or(AppError::TokenExpired)?;
    let user_id = ObjectId::parse_str(&user_id_hex).map_err(|_| AppError::TokenExpired)?;

    let hash = hash_password(&body.password)?;
    state.users.update_password(&user_id, &hash).await?;
    state.cache.del(&reset_key(&token)).await?;

    Ok(Json(json!({
        "message": "Password reset successfully",
        "success": true,
    })))
}

/// GET /api/auth/profile
pub async fn get_profile(Extension(current): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({
        "message": "User profile fetched successfully",
        "success": true,
        "user": UserResponse::from(current.0),
    }))
}

/// PUT /api/auth/profile — multipart; text fields are optional partial
/// updates, an `image` part replaces the avatar (old one destroyed).
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let mut update = ProfileUpdate::default();
    let mut avatar: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Multipart(e.to_string()))?;
                avatar = Some(bytes.to_vec());
            }
            "name" | "contact" | "address" | "city" | "country" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(e.to_string()))?;
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "name" => update.name = Some(value),
                    "contact" => update.contact = Some(value),
                    "address" => update.address = Some(value),
                    "city" => update.city = Some(value),
                    "country" => update.country = Some(value),
                    _ => unreachable!(),
                }
            }
            _ => {}
        }
    }

    if let Some(bytes) = avatar {
        let cloudinary = state
            .cloudinary
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("image storage not configured".into()))?;

        if let Some(old) = &current.0.profile_image {
            if let Err(e) = cloudinary.delete_image(&old.public_id).await {
                warn!("failed to delete previous avatar: {}", e);
            }
        }

        let uploaded = cloudinary.upload_image(&bytes, AVATARS_FOLDER).await?;
        update.profile_image = Some(crate::models::user::ProfileImage {
            url: uploaded.url,
            public_id: uploaded.public_id,
        });
    }

    let user = state.users.update_profile(&current.id(), update).await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "success": true,
        "user": UserResponse::from(user),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::users::MockUserRepo;
    use crate::test_utils::{mock_user, TestStateBuilder};

    fn signup_body(email: &str) -> Json<SignupRequest> {
        Json(SignupRequest {
            name: "Ada".into(),
            email: email.into(),
            password: "secret123".into(),
            contact: "1234567890".into(),
            role: None,
        })
    }

    fn local_addr() -> ConnectInfo<SocketAddr> {
        ConnectInfo("127.0.0.1:40000".parse().unwrap())
    }

    #[tokio::test]
    async fn signup_parks_registration_without_creating_account() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        // No expect_create: any account write would panic the test.
        let state = TestStateBuilder::new().users(users).build().await;

        signup(
            State(state.clone()),
            local_addr(),
            HeaderMap::new(),
            signup_body("ada@x.com"),
        )
        .await
        .unwrap();

        // The pending registration is in the store, keyed both ways.
        let token = state
            .cache
            .get(&verify_email_key("ada@x.com"))
            .await
            .unwrap()
            .expect("email index entry");
        let payload = state.cache.get(&verify_key(&token)).await.unwrap().unwrap();
        let pending: PendingRegistration = serde_json::from_str(&payload).unwrap();
        assert_eq!(pending.email, "ada@x.com");
        // Stored hash, not the plaintext.
        assert_ne!(pending.password, "secret123");
        assert!(bcrypt::verify("secret123", &pending.password).unwrap());
    }

    #[tokio::test]
    async fn signup_for_existing_account_is_rejected() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(|_| Ok(Some(mock_user("ada@x.com", "irrelevant"))));
        let state = TestStateBuilder::new().users(users).build().await;

        let result = signup(
            State(state),
            local_addr(),
            HeaderMap::new(),
            signup_body("ada@x.com"),
        )
        .await;
        assert!(matches!(result, Err(AppError::AccountExists)));
    }

    #[tokio::test]
    async fn repeat_signup_within_rate_window_is_limited() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        let state = TestStateBuilder::new().users(users).build().await;

        signup(
            State(state.clone()),
            local_addr(),
            HeaderMap::new(),
            signup_body("ada@x.com"),
        )
        .await
        .unwrap();

        let second = signup(
            State(state),
            local_addr(),
            HeaderMap::new(),
            signup_body("ada@x.com"),
        )
        .await;
        assert!(matches!(second, Err(AppError::RateLimited)));
    }

    #[tokio::test]
    async fn resignup_invalidates_previous_verification_link() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        let state = TestStateBuilder::new().users(users).build().await;

        signup(
            State(state.clone()),
            local_addr(),
            HeaderMap::new(),
            signup_body("ada@x.com"),
        )
        .await
        .unwrap();
        let first_token = state
            .cache
            .get(&verify_email_key("ada@x.com"))
            .await
            .unwrap()
            .unwrap();

        // Different ip, same email: not rate limited, supersedes the link.
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.9".parse().unwrap());
        signup(
            State(state.clone()),
            local_addr(),
            headers,
            signup_body("ada@x.com"),
        )
        .await
        .unwrap();

        assert!(state
            .cache
            .get(&verify_key(&first_token))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn verify_creates_account_and_consumes_token() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users
            .expect_create()
            .times(1)
            .returning(|_| Ok(ObjectId::new()));
        let state = TestStateBuilder::new().users(users).build().await;

        let pending = PendingRegistration {
            name: "Ada".into(),
            email: "ada@x.com".into(),
            password: "$2b$10$hash".into(),
            contact: "1234567890".into(),
            role: Default::default(),
        };
        state
            .cache
            .set_ex(
                &verify_key("tok"),
                &serde_json::to_string(&pending).unwrap(),
                900,
            )
            .await
            .unwrap();
        state
            .cache
            .set_ex(&verify_email_key("ada@x.com"), "tok", 900)
            .await
            .unwrap();

        verify(State(state.clone()), Path("tok".into())).await.unwrap();

        // Replay fails as expired and both index entries are gone.
        let replay = verify(State(state.clone()), Path("tok".into())).await;
        assert!(matches!(replay, Err(AppError::TokenExpired)));
        assert!(state
            .cache
            .get(&verify_email_key("ada@x.com"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn verify_with_unknown_token_creates_nothing() {
        let users = MockUserRepo::new(); // any repo call panics
        let state = TestStateBuilder::new().users(users).build().await;

        let result = verify(State(state), Path("nope".into())).await;
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[tokio::test]
    async fn login_stores_otp_but_issues_no_token() {
        let hash = bcrypt::hash("secret123", 4).unwrap();
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(mock_user("ada@x.com", &hash))));
        let state = TestStateBuilder::new().users(users).build().await;

        let response = login(
            State(state.clone()),
            local_addr(),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "ada@x.com".into(),
                password: "secret123".into(),
            }),
        )
        .await
        .unwrap();

        assert!(response.0.get("accessToken").is_none());
        let otp = state.cache.get(&otp_key("ada@x.com")).await.unwrap().unwrap();
        assert_eq!(otp.len(), 6);
    }

    #[tokio::test]
    async fn login_with_wrong_password_stores_no_otp() {
        let hash = bcrypt::hash("secret123", 4).unwrap();
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(mock_user("ada@x.com", &hash))));
        let state = TestStateBuilder::new().users(users).build().await;

        let result = login(
            State(state.clone()),
            local_addr(),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "ada@x.com".into(),
                password: "wrong".into(),
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
        assert!(state.cache.get(&otp_key("ada@x.com")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn otp_mismatch_keeps_code_replay_after_success_fails() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(|_| Ok(Some(mock_user("ada@x.com", "hash"))));
        let state = TestStateBuilder::new().users(users).build().await;
        state
            .cache
            .set_ex(&otp_key("ada@x.com"), "123456", 300)
            .await
            .unwrap();

        // Wrong code: rejected, code survives.
        let wrong = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "ada@x.com".into(),
                otp: "654321".into(),
            }),
        )
        .await;
        assert!(matches!(wrong, Err(AppError::InvalidOtp)));
        assert!(state.cache.get(&otp_key("ada@x.com")).await.unwrap().is_some());

        // Right code: tokens issued, code consumed.
        let ok = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "ada@x.com".into(),
                otp: "123456".into(),
            }),
        )
        .await
        .unwrap();
        assert!(ok.0.get("accessToken").is_some());

        // Replay of the consumed code.
        let replay = verify_otp(
            State(state),
            Json(VerifyOtpRequest {
                email: "ada@x.com".into(),
                otp: "123456".into(),
            }),
        )
        .await;
        assert!(matches!(replay, Err(AppError::OtpExpired)));
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let user = mock_user("ada@x.com", "oldhash");
        let user_id = user.id.unwrap();
        let mut users = MockUserRepo::new();
        users
            .expect_update_password()
            .times(1)
            .returning(|_, _| Ok(()));
        let state = TestStateBuilder::new().users(users).build().await;

        state
            .cache
            .set_ex(&reset_key("rtok"), &user_id.to_hex(), 900)
            .await
            .unwrap();

        reset_password(
            State(state.clone()),
            Path("rtok".into()),
            Json(ResetPasswordRequest {
                password: "newsecret".into(),
            }),
        )
        .await
        .unwrap();

        let replay = reset_password(
            State(state),
            Path("rtok".into()),
            Json(ResetPasswordRequest {
                password: "again".into(),
            }),
        )
        .await;
        assert!(matches!(replay, Err(AppError::TokenExpired)));
    }

    #[tokio::test]
    async fn forwarded_header_wins_over_socket_addr() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_ip(&headers, &addr), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new(), &addr), "127.0.0.1");
    }
}
