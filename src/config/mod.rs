use std::env;

use sqlx::SqlitePool;
use tracing::warn;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "sqlite://tessera.db?mode=rwc";
const DEFAULT_PORT: u16 = 3001;
const DEV_WEBHOOK_SECRET: &str = "whsec_dev_only";

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let webhook_secret = env::var("WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("WEBHOOK_SECRET not set, using the development-only secret");
            DEV_WEBHOOK_SECRET.to_string()
        });

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            webhook_secret,
            checkout_success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/success".to_string()),
            checkout_cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/cancelled".to_string()),
        }
    }
}

pub async fn configure_sqlite_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePool::connect(database_url).await?;

    // WAL mode: concurrent readers, one writer at a time. Order reads stay
    // responsive while a webhook delivery holds the write lock.
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    // When a lifecycle transaction is blocked by another writer, wait up to
    // 10 seconds before surfacing "database is locked".
    sqlx::query("PRAGMA busy_timeout = 10000")
        .execute(&pool)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ENV_LOCK;

    #[test]
    fn from_env_falls_back_to_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        env::remove_var("DATABASE_URL");
        env::remove_var("PORT");
        env::remove_var("WEBHOOK_SECRET");
        env::remove_var("CHECKOUT_SUCCESS_URL");
        env::remove_var("CHECKOUT_CANCEL_URL");

        let config = Config::from_env();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.webhook_secret, DEV_WEBHOOK_SECRET);
    }
}
