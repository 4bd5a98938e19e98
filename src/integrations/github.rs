use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::integrations::{read_json, CommitAuthor, CommitLookup};
use crate::metrics::record_collaborator_call;
use crate::state::AppCache;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("github-enricher/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    author: Option<GitIdentity>,
}

#[derive(Debug, Deserialize)]
struct GitIdentity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

/// Commit lookups through the GitHub REST API
pub struct GitHubApiClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubApiClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Network(format!("GitHub request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::integration(
                "github",
                format!("GET {} returned {}: {}", path, status, body.trim()),
            ));
        }

        Ok(response)
    }

    /// Check the token by fetching the authenticated user; returns the login
    pub async fn verify(&self) -> Result<String> {
        let user: UserResponse = read_json(self.get("/user").await?).await?;

        info!(login = %user.login, "Authenticated with GitHub");
        Ok(user.login)
    }

    async fn fetch_commit(&self, repo: &str, commit: &str) -> Result<CommitAuthor> {
        if repo.is_empty() || commit.is_empty() {
            return Err(AppError::Validation(
                "repository and commit must not be empty".to_string(),
            ));
        }

        let response = self
            .get(&format!("/repos/{}/commits/{}", repo, commit))
            .await?;
        let body: CommitResponse = read_json(response).await?;

        let author = body
            .commit
            .and_then(|c| c.author)
            .ok_or_else(|| {
                AppError::integration("github", format!("commit {} has no author", commit))
            })?;

        match (author.email, author.name) {
            (Some(email), Some(name)) => Ok(CommitAuthor { email, name }),
            _ => Err(AppError::integration(
                "github",
                format!("commit {} author is missing email or name", commit),
            )),
        }
    }
}

#[async_trait]
impl CommitLookup for GitHubApiClient {
    async fn lookup(&self, repo: &str, commit: &str) -> Result<CommitAuthor> {
        let result = self.fetch_commit(repo, commit).await;
        record_collaborator_call(self.source(), &result);
        result
    }

    fn source(&self) -> &'static str {
        "github_api"
    }
}

/// Tries `primary` and falls back to `secondary` on any failure
pub struct FallbackCommitLookup {
    primary: Arc<dyn CommitLookup>,
    secondary: Arc<dyn CommitLookup>,
}

impl FallbackCommitLookup {
    pub fn new(primary: Arc<dyn CommitLookup>, secondary: Arc<dyn CommitLookup>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl CommitLookup for FallbackCommitLookup {
    async fn lookup(&self, repo: &str, commit: &str) -> Result<CommitAuthor> {
        match self.primary.lookup(repo, commit).await {
            Ok(author) => Ok(author),
            Err(e) => {
                info!(
                    repo = %repo,
                    commit = %commit,
                    "{} lookup failed with {}, falling back to {}",
                    self.primary.source(),
                    e,
                    self.secondary.source()
                );
                self.secondary.lookup(repo, commit).await
            }
        }
    }

    fn source(&self) -> &'static str {
        self.primary.source()
    }
}

/// In-process memo in front of another lookup
pub struct MemoizedCommitLookup {
    inner: Arc<dyn CommitLookup>,
    memo: AppCache<(String, String), CommitAuthor>,
}

impl MemoizedCommitLookup {
    pub fn new(inner: Arc<dyn CommitLookup>, capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            memo: AppCache::new(capacity, ttl),
        }
    }
}

#[async_trait]
impl CommitLookup for MemoizedCommitLookup {
    async fn lookup(&self, repo: &str, commit: &str) -> Result<CommitAuthor> {
        let key = (repo.to_string(), commit.to_string());
        if let Some(author) = self.memo.get(&key).await {
            debug!(repo = %repo, commit = %commit, "Commit author memo hit");
            return Ok(author);
        }

        let author = self.inner.lookup(repo, commit).await.map_err(|e| {
            warn!(repo = %repo, commit = %commit, "Commit lookup failed: {}", e);
            e
        })?;
        self.memo.insert(key, author.clone()).await;
        Ok(author)
    }

    fn source(&self) -> &'static str {
        self.inner.source()
    }
}
