//! External collaborators used by the standard enrichers
//!
//! Commit metadata comes from the GitHub REST API ([`GitHubApiClient`]) or a
//! local shallow fetch ([`GitCloneClient`]); first names are classified by a
//! genderize-compatible service ([`GenderizeClient`]).

pub mod gender;
pub mod git;
pub mod github;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub use gender::GenderizeClient;
pub use git::{GitCloneClient, GitCommand};
pub use github::{FallbackCommitLookup, GitHubApiClient, MemoizedCommitLookup};

/// Author of a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub email: String,
    pub name: String,
}

/// Result of classifying a first name
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// `male`, `female` or `unknown`
    pub label: String,
    pub probability: f64,
}

/// Resolves a commit in a repository to its author
#[async_trait]
pub trait CommitLookup: Send + Sync {
    async fn lookup(&self, repo: &str, commit: &str) -> Result<CommitAuthor>;

    /// Short label used in logs and metrics
    fn source(&self) -> &'static str;
}

/// Classifies a first name
#[async_trait]
pub trait GenderClassifier: Send + Sync {
    async fn classify(&self, first_name: &str) -> Result<Classification>;
}

/// Read a response body and decode it as JSON
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| AppError::Network(format!("Failed to read response body: {}", e)))?;
    Ok(serde_json::from_str(&body)?)
}
