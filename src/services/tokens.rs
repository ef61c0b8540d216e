//! Access/refresh token issuance and the server-side refresh registry.
//!
//! Access tokens are short-lived stateless HS256 JWTs. Refresh tokens are
//! longer-lived and additionally tracked in the ephemeral store under
//! `refresh_token:{account}`; a new login supersedes the previous entry,
//! so only the most recent refresh token stays usable.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::services::cache::CacheStore;

const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id (ObjectId hex).
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    cache: Arc<dyn CacheStore>,
}

fn refresh_key(user_id: &str) -> String {
    format!("refresh_token:{}", user_id)
}

impl TokenService {
    pub fn new(access_secret: String, refresh_secret: String, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            access_secret,
            refresh_secret,
            cache,
        }
    }

    fn sign(&self, user_id: &str, secret: &str, ttl_secs: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now().timestamp() + ttl_secs) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .map_err(|e| AppError::configuration(format!("token signing failed: {}", e)))
    }

    pub fn generate_access_token(&self, user_id: &str) -> Result<String> {
        self.sign(user_id, &self.access_secret, ACCESS_TOKEN_TTL_SECS)
    }

    /// Issue an access/refresh pair after OTP verification. The refresh
    /// token replaces whatever was tracked for this account before.
    pub async fn generate_token_pair(&self, user_id: &str) -> Result<(String, String)> {
        let access = self.generate_access_token(user_id)?;
        let refresh = self.sign(user_id, &self.refresh_secret, REFRESH_TOKEN_TTL_SECS)?;

        self.cache
            .set_ex(
                &refresh_key(user_id),
                &refresh,
                REFRESH_TOKEN_TTL_SECS as u64,
            )
            .await?;

        Ok((access, refresh))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
    }

    /// A refresh token is valid only if its signature checks out AND it is
    /// still the one tracked for the account.
    pub async fn verify_refresh_token(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)?;

        match self.cache.get(&refresh_key(&claims.sub)).await? {
            Some(tracked) if tracked == token => Ok(claims),
            _ => Err(AppError::InvalidToken),
        }
    }

    /// Drop the tracked refresh token; future refresh calls fail until the
    /// next login.
    pub async fn revoke_refresh_token(&self, user_id: &str) -> Result<()> {
        self.cache.del(&refresh_key(user_id)).await
    }
}

/// Six-digit numeric OTP, zero-padded.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

/// Random 32-byte hex token for verification links and password resets.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;

    fn service() -> TokenService {
        TokenService::new(
            "access-secret".into(),
            "refresh-secret".into(),
            Arc::new(MemoryCache::new()),
        )
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn secure_token_is_64_hex_chars() {
        let token = generate_secure_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_secure_token());
    }

    #[test]
    fn access_token_round_trips() {
        let tokens = service();
        let access = tokens.generate_access_token("abc123").unwrap();
        let claims = tokens.verify_access_token(&access).unwrap();
        assert_eq!(claims.sub, "abc123");
    }

    #[test]
    fn access_token_rejects_wrong_secret() {
        let tokens = service();
        let other = TokenService::new(
            "other".into(),
            "refresh-secret".into(),
            Arc::new(MemoryCache::new()),
        );
        let access = other.generate_access_token("abc123").unwrap();
        assert!(matches!(
            tokens.verify_access_token(&access),
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn refresh_token_valid_until_revoked() {
        let tokens = service();
        let (_, refresh) = tokens.generate_token_pair("abc123").await.unwrap();

        let claims = tokens.verify_refresh_token(&refresh).await.unwrap();
        assert_eq!(claims.sub, "abc123");

        tokens.revoke_refresh_token("abc123").await.unwrap();
        assert!(matches!(
            tokens.verify_refresh_token(&refresh).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn new_login_supersedes_previous_refresh_token() {
        let tokens = service();
        let (_, first) = tokens.generate_token_pair("abc123").await.unwrap();
        // Same-second logins sign identical claims; the tracking entry is
        // what distinguishes them, so force distinct tokens.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let (_, second) = tokens.generate_token_pair("abc123").await.unwrap();

        assert!(tokens.verify_refresh_token(&second).await.is_ok());
        assert!(matches!(
            tokens.verify_refresh_token(&first).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn refresh_token_with_access_secret_rejected() {
        let tokens = service();
        let access = tokens.generate_access_token("abc123").unwrap();
        assert!(matches!(
            tokens.verify_refresh_token(&access).await,
            Err(AppError::InvalidToken)
        ));
    }
}
