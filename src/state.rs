use std::sync::Arc;

use mongodb::Database;

use crate::config::AppConfig;
use crate::repos::users::UserRepo;
use crate::services::cache::CacheStore;
use crate::services::cloudinary::CloudinaryService;
use crate::services::gemini::ImageGenerator;
use crate::services::ledger::CreditLedger;
use crate::services::mailer::EmailQueue;
use crate::services::razorpay::RazorpayService;
use crate::services::tokens::TokenService;

/// Optional services stay `None` when their credentials are absent; the
/// routes that need them answer 503 instead of taking the process down.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub cache: Arc<dyn CacheStore>,
    pub users: Arc<dyn UserRepo>,
    pub ledger: Arc<dyn CreditLedger>,
    pub tokens: TokenService,
    pub mail: EmailQueue,
    pub payment: Option<Arc<RazorpayService>>,
    pub generator: Option<Arc<dyn ImageGenerator>>,
    pub cloudinary: Option<Arc<CloudinaryService>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Database,
        cache: Arc<dyn CacheStore>,
        users: Arc<dyn UserRepo>,
        ledger: Arc<dyn CreditLedger>,
        tokens: TokenService,
        mail: EmailQueue,
    ) -> Self {
        AppState {
            config: Arc::new(config),
            db,
            cache,
            users,
            ledger,
            tokens,
            mail,
            payment: None,
            generator: None,
            cloudinary: None,
        }
    }

    pub fn with_payment(mut self, payment: Arc<RazorpayService>) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_cloudinary(mut self, cloudinary: Arc<CloudinaryService>) -> Self {
        self.cloudinary = Some(cloudinary);
        self
    }
}
