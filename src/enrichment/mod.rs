//! Dependency-ordered, cache-wrapped enrichment of CSV rows
//!
//! - `resolver` picks the enrichers that can run against an input header
//! - `cached` memoizes enricher results in a [`crate::state::CacheStore`]
//! - `processor` applies the chain to a single row under a row deadline
//! - `pipeline` streams a whole CSV document through the chain

pub mod cached;
pub mod enrichers;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_support;

pub use cached::{cache_key, CachedEnricher};
pub use enrichers::{
    select_enrichers, standard_enrichers, CommitAuthorEnricher, Enricher, FirstNameEnricher,
    GenderEnricher,
};
pub use models::{
    DuplicatePolicy, EnrichContext, EnrichmentConfig, FieldError, FieldMap, PipelineStats,
    ProcessedRow, ResolutionMode, ResolutionPolicy, ResolvedChain,
};
pub use pipeline::EnrichmentPipeline;
pub use processor::RowProcessor;
pub use resolver::resolve;
