//! Counting collaborators for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use github_enricher::integrations::{Classification, CommitAuthor, CommitLookup, GenderClassifier};
use github_enricher::{AppError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Commit lookup answering from a fixed table
#[derive(Default)]
pub struct CountingCommits {
    authors: HashMap<(String, String), CommitAuthor>,
    calls: AtomicUsize,
}

impl CountingCommits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, repo: &str, commit: &str, email: &str, name: &str) -> Self {
        self.authors.insert(
            (repo.to_string(), commit.to_string()),
            CommitAuthor {
                email: email.to_string(),
                name: name.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitLookup for CountingCommits {
    async fn lookup(&self, repo: &str, commit: &str) -> Result<CommitAuthor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.authors
            .get(&(repo.to_string(), commit.to_string()))
            .cloned()
            .ok_or_else(|| AppError::integration("counting", format!("no commit {}", commit)))
    }

    fn source(&self) -> &'static str {
        "counting"
    }
}

/// Classifier with a fixed answer per first name
#[derive(Default)]
pub struct CountingGender {
    labels: HashMap<String, (String, f64)>,
    calls: AtomicUsize,
}

impl CountingGender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, first_name: &str, label: &str, probability: f64) -> Self {
        self.labels
            .insert(first_name.to_string(), (label.to_string(), probability));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenderClassifier for CountingGender {
    async fn classify(&self, first_name: &str) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (label, probability) = self
            .labels
            .get(first_name)
            .cloned()
            .unwrap_or_else(|| ("unknown".to_string(), 0.0));
        Ok(Classification { label, probability })
    }
}
