//! github-enricher
//!
//! Streams CSV rows through a chain of enrichers that derive new columns
//! (commit author email and name, first name, gender) from existing ones.
//! The chain is resolved once from the input header, results of expensive
//! enrichers are memoized in a shared cache store, and every row is written
//! as soon as it is enriched.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod integrations;
pub mod metrics;
pub mod names;
pub mod state;

pub use error::{AppError, Result};
