use crate::enrichment::EnrichmentConfig;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cache backend configuration
    pub cache: CacheConfig,

    /// Commit metadata collaborator configuration
    pub github: GitHubConfig,

    /// Gender classifier configuration
    pub gender: GenderConfig,

    /// Enricher selection and resolution policy
    pub pipeline: EnrichmentConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from embedded defaults, an optional file and the environment.
    ///
    /// An explicitly passed path must exist; otherwise `CONFIG_PATH` is consulted and
    /// may be absent.
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let file_source = match path {
            Some(path) => config::File::from(path).required(true),
            None => {
                let config_path = std::env::var("CONFIG_PATH")
                    .unwrap_or_else(|_| "github-enricher.toml".to_string());
                config::File::with_name(&config_path).required(false)
            }
        };

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(file_source)
            // Override with environment variables (prefix: GITHUB_ENRICHER__)
            .add_source(
                config::Environment::with_prefix("GITHUB_ENRICHER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("pipeline.enrichers")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject configurations that cannot start a run
    pub fn validate(&self) -> Result<()> {
        match self.cache.backend {
            CacheBackend::Redis => {
                if self
                    .cache
                    .redis_addr
                    .as_deref()
                    .map_or(true, |addr| addr.trim().is_empty())
                {
                    return Err(AppError::Configuration(
                        "Redis cache requires 'REDIS_ADDR' (or cache.redis_addr) to be set"
                            .to_string(),
                    ));
                }
            }
            CacheBackend::Sled => {
                if self.cache.sled_path.is_none() {
                    return Err(AppError::Configuration(
                        "Sled cache requires 'cache.sled_path'".to_string(),
                    ));
                }
            }
            CacheBackend::Memory => {}
        }

        if self.pipeline.row_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "pipeline.row_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.pipeline.enrichers.is_empty() {
            return Err(AppError::Configuration(
                "At least one enricher must be selected".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache backend type
    #[serde(default)]
    pub backend: CacheBackend,

    /// Redis address (`host:port` or `redis://` URL)
    pub redis_addr: Option<String>,

    /// Redis password
    pub redis_password: Option<String>,

    /// Path for the embedded Sled database
    pub sled_path: Option<PathBuf>,

    /// Prefix prepended to every Redis key
    #[serde(default)]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Redis,
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Base URL repositories are fetched from
    #[serde(default = "default_clone_url_base")]
    pub clone_url_base: String,

    /// Directory holding per-repository shallow clones
    pub clone_dir: Option<PathBuf>,

    /// API token; without one only the clone lookup is used
    pub token: Option<String>,

    /// API request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for a single git invocation (seconds)
    #[serde(default = "default_git_timeout")]
    pub git_timeout_secs: u64,

    /// Fall back to a shallow fetch when the API lookup fails
    #[serde(default = "default_true")]
    pub fallback_to_clone: bool,
}

impl GitHubConfig {
    /// Clone directory, defaulting to `$TMPDIR/github-enricher`
    pub fn resolved_clone_dir(&self) -> PathBuf {
        self.clone_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("github-enricher"))
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            clone_url_base: default_clone_url_base(),
            clone_dir: None,
            token: None,
            request_timeout_secs: default_request_timeout(),
            git_timeout_secs: default_git_timeout(),
            fallback_to_clone: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenderConfig {
    /// Classifier endpoint
    #[serde(default = "default_gender_api_url")]
    pub api_url: String,

    /// Optional API key
    pub api_key: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GenderConfig {
    fn default() -> Self {
        Self {
            api_url: default_gender_api_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Write Prometheus text exposition here when the run ends
    pub metrics_path: Option<PathBuf>,
}

// Default value functions
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_clone_url_base() -> String {
    "https://github.com".to_string()
}

fn default_gender_api_url() -> String {
    "https://api.genderize.io".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_git_timeout() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
