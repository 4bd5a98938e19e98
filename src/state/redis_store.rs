use crate::error::{AppError, Result};
use crate::state::CacheStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo};

/// Redis-backed enrichment cache
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Connect to Redis at `addr` (`host:port` or a `redis://` URL)
    pub async fn new(addr: &str, password: Option<&str>) -> Result<Self> {
        Self::new_with_prefix(addr, password, "").await
    }

    /// Connect with a key prefix prepended to every cache key
    pub async fn new_with_prefix(
        addr: &str,
        password: Option<&str>,
        prefix: &str,
    ) -> Result<Self> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        };

        let mut info = url.as_str().into_connection_info().map_err(|e| {
            AppError::Configuration(format!("Invalid Redis address '{}': {}", addr, e))
        })?;
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            info.redis.password = Some(password.to_string());
        }

        let client = Client::open(info).map_err(|e| {
            AppError::Cache(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        // Test connection
        let mut test_conn = connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut test_conn)
            .await
            .map_err(|e| AppError::Cache(format!("Redis ping failed: {}", e)))?;

        tracing::info!(addr = %addr, prefix = %prefix, "Connected to Redis cache");

        Ok(Self {
            connection,
            key_prefix: prefix.to_string(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();

        let value: Option<String> = conn
            .get(self.prefixed(key))
            .await
            .map_err(|e| AppError::Cache(format!("redis get: {}", e)))?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .set(self.prefixed(key), value)
            .await
            .map_err(|e| AppError::Cache(format!("redis set: {}", e)))?;

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
