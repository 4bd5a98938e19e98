use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::integrations::{CommitAuthor, CommitLookup};
use crate::metrics::record_collaborator_call;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

lazy_static! {
    static ref REPO_NAME: Regex =
        Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("valid repository pattern");
    static ref COMMIT_SHA: Regex = Regex::new(r"^[0-9a-fA-F]{7,64}$").expect("valid sha pattern");
}

/// Builder for a single git invocation with captured output and a timeout
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout_duration: Duration,
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            timeout_duration: Duration::from_secs(300),
            context: None,
        }
    }
}

/// Captured output of a successful git invocation
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git as if started in `dir` (`git -C dir`)
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label included in log lines and error messages
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn describe(&self) -> String {
        match &self.context {
            Some(ctx) => format!("{} (git {})", ctx, self.args.join(" ")),
            None => format!("git {}", self.args.join(" ")),
        }
    }

    /// Run the command; a non-zero exit status is an error carrying stderr
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let mut cmd = Command::new("git");
        if let Some(dir) = &self.current_dir {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(&self.args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(target: "git", "Executing {}", self.describe());

        let output = match timeout(self.timeout_duration, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                AppError::integration("git", format!("failed to run {}: {}", self.describe(), e))
            })?,
            Err(_) => {
                return Err(AppError::Timeout(format!(
                    "{} timed out after {}s",
                    self.describe(),
                    self.timeout_duration.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(AppError::integration(
                "git",
                format!(
                    "{} exited with {}: {}",
                    self.describe(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        if !stderr.trim().is_empty() {
            debug!(target: "git", "{}: {}", self.describe(), stderr.trim());
        }

        Ok(GitCommandOutput { stdout })
    }

    /// Run the command and return its exit success without treating failure as an error
    pub async fn succeeds(self) -> Result<bool> {
        match self.execute().await {
            Ok(_) => Ok(true),
            Err(AppError::Integration { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Commit lookups through a shallow fetch into a per-repository bare clone
pub struct GitCloneClient {
    clone_url_base: String,
    clone_dir: PathBuf,
    git_timeout: Duration,
}

impl GitCloneClient {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            clone_url_base: config.clone_url_base.trim_end_matches('/').to_string(),
            clone_dir: config.resolved_clone_dir(),
            git_timeout: Duration::from_secs(config.git_timeout_secs),
        }
    }

    /// Storage directory for `repo`, stable across runs
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        let sanitized: String = repo
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let digest = Sha256::digest(repo.as_bytes());
        let suffix: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
        self.clone_dir.join(format!("{}-{}", sanitized, suffix))
    }

    fn remote_url(&self, repo: &str) -> String {
        format!("{}/{}.git", self.clone_url_base, repo)
    }

    fn git(&self, dir: &Path) -> GitCommand {
        GitCommand::new().current_dir(dir).timeout(self.git_timeout)
    }

    async fn fetch_author(&self, repo: &str, commit: &str) -> Result<CommitAuthor> {
        if commit.is_empty() {
            return Err(AppError::Validation("commit is empty".to_string()));
        }
        if !COMMIT_SHA.is_match(commit) {
            return Err(AppError::Validation(format!("'{}' is not a commit hash", commit)));
        }
        if !REPO_NAME.is_match(repo) || repo.split('/').any(|part| part == "." || part == "..") {
            return Err(AppError::Validation(format!(
                "'{}' is not an owner/name repository",
                repo
            )));
        }

        let dir = self.repo_dir(repo);
        tokio::fs::create_dir_all(&dir).await?;

        if !dir.join("HEAD").exists() {
            self.git(&dir)
                .args(["init", "--bare", "--quiet"])
                .with_context("Initializing clone storage")
                .execute()
                .await?;
        }

        let object = format!("{}^{{commit}}", commit);
        let present = self
            .git(&dir)
            .args(["cat-file", "-e", object.as_str()])
            .succeeds()
            .await?;

        if !present {
            let url = self.remote_url(repo);
            info!(url = %url, dir = %dir.display(), "Shallow fetching commit {}", commit);
            self.git(&dir)
                .args(["fetch", "--quiet", "--depth", "1", url.as_str(), commit])
                .with_context(format!("Fetching {}", repo))
                .execute()
                .await?;
        }

        let output = self
            .git(&dir)
            .args(["show", "-s", "--format=%ae%x00%an", commit])
            .execute()
            .await?;

        parse_author(&output.stdout).ok_or_else(|| {
            AppError::integration("git", format!("unexpected author output for {}", commit))
        })
    }
}

fn parse_author(stdout: &str) -> Option<CommitAuthor> {
    let line = stdout.trim_end_matches(['\r', '\n']);
    let (email, name) = line.split_once('\0')?;
    Some(CommitAuthor {
        email: email.to_string(),
        name: name.to_string(),
    })
}

#[async_trait]
impl CommitLookup for GitCloneClient {
    async fn lookup(&self, repo: &str, commit: &str) -> Result<CommitAuthor> {
        let result = self.fetch_author(repo, commit).await;
        record_collaborator_call(self.source(), &result);
        result
    }

    fn source(&self) -> &'static str {
        "git_clone"
    }
}
