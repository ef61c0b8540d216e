use mongodb::{Client, Database};

use crate::config::AppConfig;

pub async fn get_db_client(config: &AppConfig) -> Database {
    let client = Client::with_uri_str(&config.database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db = client.database(&config.database_name);

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("✅ Connected to database: {}", config.database_name);
            tracing::info!("📂 Collections found: {:?}", collections);

            if !collections.contains(&"users".to_string()) {
                tracing::warn!("⚠️ 'users' collection not found yet; it is created on first write");
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Database '{}' may not exist or is inaccessible: {}",
                config.database_name,
                e
            );
        }
    }

    db
}
