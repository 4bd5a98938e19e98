use crate::config::{CacheBackend, CacheConfig};
use crate::error::{AppError, Result};
use crate::state::{CacheStore, InMemoryStore, RedisStore, SledStore};
use std::sync::Arc;

/// Create a cache store based on configuration
pub async fn create_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Redis => {
            let addr = config
                .redis_addr
                .as_deref()
                .filter(|addr| !addr.trim().is_empty())
                .ok_or_else(|| {
                    AppError::Configuration(
                        "Redis backend requires 'redis_addr' configuration".to_string(),
                    )
                })?;

            tracing::info!(addr = %addr, "Initializing Redis cache backend");

            let store = RedisStore::new_with_prefix(
                addr,
                config.redis_password.as_deref(),
                &config.key_prefix,
            )
            .await?;
            Ok(Arc::new(store))
        }

        CacheBackend::Sled => {
            let path = config.sled_path.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "Sled backend requires 'sled_path' configuration".to_string(),
                )
            })?;

            tracing::info!(path = ?path, "Initializing Sled cache backend");

            let store = SledStore::new(path)?;
            Ok(Arc::new(store))
        }

        CacheBackend::Memory => Ok(create_in_memory_store()),
    }
}

/// Create an in-memory store (for testing and one-off runs)
pub fn create_in_memory_store() -> Arc<dyn CacheStore> {
    tracing::info!("Initializing in-memory cache backend");
    Arc::new(InMemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_config(backend: CacheBackend) -> CacheConfig {
        CacheConfig {
            backend,
            redis_addr: None,
            redis_password: None,
            sled_path: None,
            key_prefix: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_sled_store() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = cache_config(CacheBackend::Sled);
        config.sled_path = Some(temp_dir.path().to_path_buf());

        let store = create_store(&config).await.unwrap();
        assert_eq!(store.backend(), "sled");
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_create_in_memory_store() {
        let store = create_store(&cache_config(CacheBackend::Memory)).await.unwrap();
        assert_eq!(store.backend(), "memory");
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_requires_path() {
        let result = create_store(&cache_config(CacheBackend::Sled)).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_redis_requires_addr() {
        let result = create_store(&cache_config(CacheBackend::Redis)).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
