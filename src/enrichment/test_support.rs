//! Fakes shared by the enrichment unit tests.

use crate::enrichment::enrichers::Enricher;
use crate::enrichment::models::{EnrichContext, FieldMap};
use crate::error::{AppError, Result};
use crate::state::CacheStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn row(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

enum Behavior {
    Value(String),
    /// Joins the dependency values with '+'
    Derived,
    Fail,
    Sleep(Duration),
}

/// Enricher with scripted behavior that counts its invocations
pub struct CountingEnricher {
    field: String,
    dependencies: Vec<String>,
    behavior: Behavior,
    cacheable: bool,
    calls: AtomicUsize,
}

impl CountingEnricher {
    fn build(field: &str, deps: &[&str], behavior: Behavior) -> Self {
        Self {
            field: field.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            behavior,
            cacheable: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(field: &str, deps: &[&str], value: &str) -> Self {
        Self::build(field, deps, Behavior::Value(value.to_string()))
    }

    pub fn derived(field: &str, deps: &[&str]) -> Self {
        Self::build(field, deps, Behavior::Derived)
    }

    pub fn failing(field: &str, deps: &[&str]) -> Self {
        Self::build(field, deps, Behavior::Fail)
    }

    pub fn sleeping(field: &str, deps: &[&str], delay: Duration) -> Self {
        Self::build(field, deps, Behavior::Sleep(delay))
    }

    pub fn uncacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enricher for CountingEnricher {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    async fn enrich(&self, _ctx: &EnrichContext, row: &FieldMap) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Value(value) => Ok(value.clone()),
            Behavior::Derived => Ok(self
                .dependencies
                .iter()
                .map(|d| row.get(d).cloned().unwrap_or_default())
                .collect::<Vec<_>>()
                .join("+")),
            Behavior::Fail => Err(AppError::integration("test", "lookup failed")),
            Behavior::Sleep(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("late".to_string())
            }
        }
    }
}

/// Cache store whose writes (and optionally reads) always fail
pub struct FailingStore {
    fail_reads: bool,
}

impl FailingStore {
    pub fn writes() -> Self {
        Self { fail_reads: false }
    }

    pub fn everything() -> Self {
        Self { fail_reads: true }
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        if self.fail_reads {
            Err(AppError::Cache("connection refused".to_string()))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(AppError::Cache("read-only replica".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
