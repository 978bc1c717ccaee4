use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseConfig, StorageBackend};

use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::store::FeedStore;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Build the configured store. Postgres connects eagerly and bootstraps
/// its tables so a bad `DATABASE_URL` fails at startup.
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn FeedStore>, DatabaseError> {
    match config.storage {
        StorageBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| DatabaseError::ConnectionError("DATABASE_URL is not set".to_string()))?;
            let store = PgStore::connect(url, config).await?;
            store.migrate().await?;
            info!("Connected to PostgreSQL store");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn memory_backend_needs_no_url() {
        let config = AppConfig::development().database;
        let store = connect_store(&config).await.unwrap();
        assert_eq!(store.backend(), "memory");
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn postgres_backend_without_url_is_an_error() {
        let mut config = AppConfig::development().database;
        config.storage = StorageBackend::Postgres;
        config.url = None;
        assert!(matches!(connect_store(&config).await, Err(DatabaseError::ConnectionError(_))));
    }
}
