use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::enrichment::enrichers::Enricher;

/// Row-so-far as a field -> value mapping
pub type FieldMap = HashMap<String, String>;

/// Configuration for enricher selection and resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Enrichers to run, by field name
    pub enrichers: Vec<String>,

    /// What to do with enrichers whose dependencies are missing
    #[serde(default)]
    pub resolution_mode: ResolutionMode,

    /// What to do with enrichers whose column already exists
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Wall-clock ceiling for all enrichers of one row (seconds)
    pub row_timeout_secs: u64,
}

impl EnrichmentConfig {
    pub fn row_timeout(&self) -> Duration {
        Duration::from_secs(self.row_timeout_secs)
    }

    pub fn policy(&self) -> ResolutionPolicy {
        ResolutionPolicy {
            mode: self.resolution_mode,
            on_duplicate: self.duplicate_policy,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enrichers: vec![
                "email".to_string(),
                "name".to_string(),
                "first_name".to_string(),
                "gender".to_string(),
            ],
            resolution_mode: ResolutionMode::default(),
            duplicate_policy: DuplicatePolicy::default(),
            row_timeout_secs: 60,
        }
    }
}

/// Handling of enrichers with unmet dependencies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Drop the enricher for this run
    #[default]
    Permissive,
    /// Fail the whole run
    Strict,
}

/// Handling of enrichers whose output column is already present
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Leave the existing column alone and skip the enricher
    Skip,
    /// Fail the whole run
    #[default]
    Fail,
}

/// Resolver policy pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionPolicy {
    pub mode: ResolutionMode,
    pub on_duplicate: DuplicatePolicy,
}

impl ResolutionPolicy {
    /// Drop unsatisfiable enrichers and keep existing columns
    pub fn permissive() -> Self {
        Self {
            mode: ResolutionMode::Permissive,
            on_duplicate: DuplicatePolicy::Skip,
        }
    }

    pub fn strict() -> Self {
        Self {
            mode: ResolutionMode::Strict,
            on_duplicate: DuplicatePolicy::Fail,
        }
    }
}

/// Enricher chain selected for one input stream
#[derive(Clone)]
pub struct ResolvedChain {
    /// Columns as read from the input
    pub input_header: Vec<String>,

    /// Input columns followed by one column per accepted enricher
    pub output_header: Vec<String>,

    /// Accepted enrichers, in execution order
    pub enrichers: Vec<Arc<dyn Enricher>>,
}

impl ResolvedChain {
    /// Field names of the accepted enrichers
    pub fn enricher_names(&self) -> Vec<&str> {
        self.enrichers.iter().map(|e| e.field_name()).collect()
    }
}

impl std::fmt::Debug for ResolvedChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedChain")
            .field("input_header", &self.input_header)
            .field("output_header", &self.output_header)
            .field("enrichers", &self.enricher_names())
            .finish()
    }
}

/// Execution context shared by every enricher of one row
#[derive(Debug, Clone, Copy)]
pub struct EnrichContext {
    /// 1-based data row number (the header is row 0)
    pub row_number: u64,

    /// Instant after which the row's remaining enrichers are abandoned
    pub deadline: Instant,
}

impl EnrichContext {
    pub fn new(row_number: u64, timeout: Duration) -> Self {
        Self {
            row_number,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// One enricher failure within a row
#[derive(Debug)]
pub struct FieldError {
    pub field: String,
    pub error: AppError,
}

/// Result of processing one row
#[derive(Debug)]
pub struct ProcessedRow {
    /// Input values followed by one value per enricher (empty on failure)
    pub fields: Vec<String>,

    /// Enrichers that failed on this row
    pub errors: Vec<FieldError>,
}

impl ProcessedRow {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Data rows written
    pub rows_processed: u64,

    /// Fields rendered empty because their enricher failed
    pub field_failures: u64,

    /// Rows with at least one failed field
    pub rows_with_failures: u64,

    /// Output header as written
    pub output_header: Vec<String>,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl PipelineStats {
    /// Fraction of rows enriched without any failure
    pub fn success_rate(&self) -> f64 {
        if self.rows_processed == 0 {
            return 0.0;
        }
        (self.rows_processed - self.rows_with_failures) as f64 / self.rows_processed as f64
    }
}
