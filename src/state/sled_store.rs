use crate::error::{AppError, Result};
use crate::state::CacheStore;
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent enrichment cache using the Sled embedded database
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    entries: sled::Tree,
}

impl SledStore {
    /// Open (or create) a store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref).map_err(|e| {
            AppError::Cache(format!("Failed to open Sled database: {}", e))
        })?;

        let entries = db.open_tree("enrichments").map_err(|e| {
            AppError::Cache(format!("Failed to open enrichments tree: {}", e))
        })?;

        tracing::info!("Initialized Sled cache at {:?}", path_ref);

        Ok(Self {
            db: Arc::new(db),
            entries,
        })
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Cache(format!("Failed to flush Sled database: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entries.get(key.as_bytes()) {
            Ok(Some(bytes)) => {
                let value = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    AppError::Cache(format!("Cached value for '{}' is not UTF-8: {}", key, e))
                })?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Cache(format!("sled get: {}", e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| AppError::Cache(format!("sled insert: {}", e)))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sled_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();

        assert_eq!(store.get("name_[commit:abc]").await.unwrap(), None);
        store.set("name_[commit:abc]", "Ann Lee").await.unwrap();
        assert_eq!(
            store.get("name_[commit:abc]").await.unwrap().as_deref(),
            Some("Ann Lee")
        );
    }

    #[tokio::test]
    async fn test_sled_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = SledStore::new(temp_dir.path()).unwrap();
            store.set("gender_[first_name:Ann]", "female").await.unwrap();
            store.flush().await.unwrap();
        }

        let reopened = SledStore::new(temp_dir.path()).unwrap();
        assert_eq!(
            reopened
                .get("gender_[first_name:Ann]")
                .await
                .unwrap()
                .as_deref(),
            Some("female")
        );
    }
}
