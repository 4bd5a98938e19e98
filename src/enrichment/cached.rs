use crate::enrichment::enrichers::Enricher;
use crate::enrichment::models::{EnrichContext, FieldMap};
use crate::error::Result;
use crate::metrics::ENRICHER_METRICS;
use crate::state::CacheStore;
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Memoizing wrapper around another enricher.
///
/// Results are stored under `<field>_[dep:value]...`, built from the wrapped
/// enricher's cache-key fields as they are in the row at call time. Failures are
/// never stored.
pub struct CachedEnricher {
    inner: Arc<dyn Enricher>,
    store: Arc<dyn CacheStore>,
}

impl CachedEnricher {
    pub fn new(inner: Arc<dyn Enricher>, store: Arc<dyn CacheStore>) -> Self {
        Self { inner, store }
    }

    /// Wrap `inner` unless it opted out of caching
    pub fn wrap(inner: Arc<dyn Enricher>, store: Arc<dyn CacheStore>) -> Arc<dyn Enricher> {
        if inner.cacheable() {
            Arc::new(Self::new(inner, store))
        } else {
            inner
        }
    }

    /// Cache key for this enricher given the row-so-far
    pub fn cache_key(&self, row: &FieldMap) -> String {
        cache_key(self.inner.field_name(), self.inner.cache_key_fields(), row)
    }
}

/// Build the content-addressed key for `field` from the key fields' current values.
///
/// `\` and `]` inside a value are backslash-escaped so each segment ends at the
/// first unescaped `]`.
pub fn cache_key(field: &str, key_fields: &[String], row: &FieldMap) -> String {
    let mut key = String::with_capacity(field.len() + 1 + key_fields.len() * 24);
    key.push_str(field);
    key.push('_');
    for dep in key_fields {
        let value = row.get(dep).map(String::as_str).unwrap_or_default();
        // Writing into a String cannot fail
        let _ = write!(key, "[{}:", dep);
        for ch in value.chars() {
            if ch == '\\' || ch == ']' {
                key.push('\\');
            }
            key.push(ch);
        }
        key.push(']');
    }
    key
}

#[async_trait]
impl Enricher for CachedEnricher {
    fn field_name(&self) -> &str {
        self.inner.field_name()
    }

    fn dependencies(&self) -> &[String] {
        self.inner.dependencies()
    }

    fn cache_key_fields(&self) -> &[String] {
        self.inner.cache_key_fields()
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn enrich(&self, ctx: &EnrichContext, row: &FieldMap) -> Result<String> {
        let field = self.inner.field_name();
        let key = self.cache_key(row);

        match self.store.get(&key).await {
            Ok(Some(cached)) => {
                ENRICHER_METRICS
                    .cache_lookups
                    .with_label_values(&[field, "hit"])
                    .inc();
                debug!(row = ctx.row_number, key = %key, "Cache hit");
                return Ok(cached);
            }
            Ok(None) => {
                ENRICHER_METRICS
                    .cache_lookups
                    .with_label_values(&[field, "miss"])
                    .inc();
            }
            Err(e) => {
                ENRICHER_METRICS
                    .cache_lookups
                    .with_label_values(&[field, "error"])
                    .inc();
                warn!(
                    row = ctx.row_number,
                    key = %key,
                    backend = self.store.backend(),
                    "Cache read failed, computing instead: {}",
                    e
                );
            }
        }

        let start = Instant::now();
        let value = self.inner.enrich(ctx, row).await?;
        let elapsed = start.elapsed();
        ENRICHER_METRICS
            .compute_duration
            .with_label_values(&[field])
            .observe(elapsed.as_secs_f64());

        if let Err(e) = self.store.set(&key, &value).await {
            ENRICHER_METRICS
                .cache_write_failures
                .with_label_values(&[field])
                .inc();
            warn!(
                row = ctx.row_number,
                key = %key,
                backend = self.store.backend(),
                "Cache write failed, keeping computed value: {}",
                e
            );
        }

        info!(
            row = ctx.row_number,
            elapsed_ms = elapsed.as_millis() as u64,
            "MISS on {} = {}",
            key,
            value
        );
        Ok(value)
    }
}
