//! Shared fixtures for handler tests. The Mongo client connects lazily,
//! so tests that never touch a collection run without a server.

use std::sync::Arc;

use mongodb::bson::{oid::ObjectId, DateTime};
use mongodb::Client;

use crate::config::AppConfig;
use crate::models::user::{Role, User};
use crate::repos::users::{MockUserRepo, UserRepo};
use crate::services::cache::MemoryCache;
use crate::services::ledger::test_support::MemoryLedger;
use crate::services::ledger::CreditLedger;
use crate::services::mailer::{EmailQueue, LogMailer};
use crate::services::tokens::TokenService;
use crate::state::AppState;

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "mongodb://127.0.0.1:27017".into(),
        database_name: "imagineit-test".into(),
        redis_url: None,
        access_token_secret: "test-access-secret".into(),
        refresh_token_secret: "test-refresh-secret".into(),
        razorpay_key_id: None,
        razorpay_key_secret: None,
        gemini_api_key: None,
        smtp_url: None,
        smtp_from: "Test <test@example.com>".into(),
        rate_limit_fail_open: true,
        port: 0,
        host: "127.0.0.1".into(),
    }
}

pub fn mock_user(email: &str, password_hash: &str) -> User {
    User {
        id: Some(ObjectId::new()),
        name: "Ada".into(),
        email: email.into(),
        password: password_hash.into(),
        contact: "1234567890".into(),
        role: Role::User,
        credits: 0,
        address: None,
        city: None,
        country: None,
        profile_image: None,
        created_at: DateTime::now(),
    }
}

/// Builds an `AppState` over in-memory seams. Defaults: an expectation-less
/// `MockUserRepo` (any call panics the test), an empty `MemoryLedger`, a
/// `MemoryCache`, and a logging mailer.
pub struct TestStateBuilder {
    users: Arc<dyn UserRepo>,
    ledger: Arc<dyn CreditLedger>,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            users: Arc::new(MockUserRepo::new()),
            ledger: Arc::new(MemoryLedger::default()),
        }
    }

    pub fn users(mut self, users: MockUserRepo) -> Self {
        self.users = Arc::new(users);
        self
    }

    pub fn ledger(mut self, ledger: impl CreditLedger + 'static) -> Self {
        self.ledger = Arc::new(ledger);
        self
    }

    pub async fn build(self) -> AppState {
        let config = test_config();
        let db = Client::with_uri_str(&config.database_url)
            .await
            .expect("client options")
            .database(&config.database_name);

        let cache = Arc::new(MemoryCache::new());
        let tokens = TokenService::new(
            config.access_token_secret.clone(),
            config.refresh_token_secret.clone(),
            cache.clone(),
        );
        let mail = EmailQueue::start(Arc::new(LogMailer));

        AppState::new(config, db, cache, self.users, self.ledger, tokens, mail)
    }
}
