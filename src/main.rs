use axum::extract::{DefaultBodyLimit, State};
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod database;
mod dtos;
mod errors;
mod handlers;
mod middleware;
mod models;
mod repos;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_utils;

use config::AppConfig;
use database::connection::get_db_client;
use repos::users::MongoUserRepo;
use services::cache::{CacheStore, MemoryCache, RedisCache};
use services::cloudinary::CloudinaryService;
use services::gemini::GeminiService;
use services::ledger::MongoLedger;
use services::mailer::{EmailQueue, LogMailer, Mailer, SmtpMailer};
use services::razorpay::RazorpayService;
use services::tokens::TokenService;
use state::AppState;

// uploads can carry full-resolution photos
const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    let db = get_db_client(&config).await;
    let app_state = initialize_app_state(config, db).await;

    let app = build_router(app_state.clone());
    start_server(app, &app_state.config).await;
}

async fn initialize_app_state(config: AppConfig, db: mongodb::Database) -> AppState {
    let cache: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => match RedisCache::new(url) {
            Ok(redis) => {
                tracing::info!("✅ Redis cache initialized");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::error!("❌ Failed to initialize Redis: {}", e);
                tracing::warn!("Falling back to in-memory cache");
                Arc::new(MemoryCache::new())
            }
        },
        None => {
            tracing::warn!("⚠️ REDIS_URL not set, using in-memory cache (single instance only)");
            Arc::new(MemoryCache::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp_url {
        Some(url) => match SmtpMailer::new(url, config.smtp_from.clone()) {
            Ok(smtp) => {
                tracing::info!("✅ SMTP mailer initialized");
                Arc::new(smtp)
            }
            Err(e) => {
                tracing::error!("❌ Failed to initialize SMTP: {}", e);
                tracing::warn!("Emails will be logged instead of sent");
                Arc::new(LogMailer)
            }
        },
        None => {
            tracing::warn!("⚠️ SMTP_URL not set, emails will be logged instead of sent");
            Arc::new(LogMailer)
        }
    };
    let mail = EmailQueue::start(mailer);

    let users = Arc::new(MongoUserRepo::new(&db));
    let ledger = Arc::new(MongoLedger::new(&db));
    let tokens = TokenService::new(
        config.access_token_secret.clone(),
        config.refresh_token_secret.clone(),
        cache.clone(),
    );

    let mut app_state = AppState::new(config, db, cache, users, ledger, tokens, mail);

    match app_state.config.razorpay_keys() {
        Some((key_id, key_secret)) => {
            app_state = app_state.with_payment(Arc::new(RazorpayService::new(key_id, key_secret)));
            tracing::info!("✅ Payment service initialized");
        }
        None => tracing::warn!("⚠️ Razorpay keys missing, payment routes disabled"),
    }

    match app_state.config.gemini_api_key.clone() {
        Some(key) => {
            app_state = app_state.with_generator(Arc::new(GeminiService::new(key)));
            tracing::info!("✅ Image generation service initialized");
        }
        None => tracing::warn!("⚠️ GEMINI_API_KEY missing, generation routes disabled"),
    }

    match CloudinaryService::from_env() {
        Ok(cloudinary) => {
            app_state = app_state.with_cloudinary(Arc::new(cloudinary));
            tracing::info!("✅ Cloudinary service initialized");
        }
        Err(e) => tracing::warn!("⚠️ Cloudinary disabled: {}", e),
    }

    app_state
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/auth", routes::auth::routes(app_state.clone()))
        .nest("/api/user", routes::user::routes(app_state.clone()))
        .nest("/api/payment", routes::payment::routes(app_state.clone()))
        .nest("/api/admin", routes::admin::routes(app_state.clone()))
        .nest("/api/forms", routes::forms::routes())
        .nest("/api/contact", routes::forms::contact_routes())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &AppConfig) {
    let ip = config
        .host
        .parse::<std::net::IpAddr>()
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
    let addr = SocketAddr::from((ip, config.port));

    tracing::info!("🚀 Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "🎨 ImagineIt API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "payment": state.payment.is_some(),
        "generation": state.generator.is_some(),
        "storage": state.cloudinary.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
