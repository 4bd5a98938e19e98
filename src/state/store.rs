use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Trait for the key/value store that backs enrichment memoization.
///
/// Keys are content-addressed, so stores never need TTLs or compare-and-swap:
/// two writers racing on one key write the same value.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a cached value, `None` on miss
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

/// In-memory cache store (for tests and throwaway runs)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        tracing::trace!(key = %key, "Cache entry stored");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
