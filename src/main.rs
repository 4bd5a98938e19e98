use anyhow::Context;
use clap::Parser;
use github_enricher::{
    config::{CacheBackend, Config, GitHubConfig},
    enrichment::{
        select_enrichers, standard_enrichers, DuplicatePolicy, Enricher, EnrichmentPipeline,
        ResolutionMode,
    },
    integrations::{
        CommitLookup, FallbackCommitLookup, GenderizeClient, GitCloneClient, GitHubApiClient,
        MemoizedCommitLookup,
    },
    metrics::{gather_metrics, init_metrics},
    state::create_store,
    AppError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "github-enricher", version)]
#[command(about = "Add commit author and name-derived columns to CSV read from stdin", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enrichers to run, comma separated
    #[arg(short, long, value_delimiter = ',', value_name = "NAMES")]
    enrichers: Option<Vec<String>>,

    /// Fail when an enricher's dependencies are not available
    #[arg(long)]
    strict: bool,

    /// What to do when an enricher's column already exists
    #[arg(long, value_enum, value_name = "POLICY")]
    on_duplicate: Option<DuplicatePolicy>,

    /// Wall-clock budget for all enrichers of one row
    #[arg(long, value_name = "SECS")]
    row_timeout: Option<u64>,

    /// Cache backend
    #[arg(long, value_enum)]
    cache: Option<CacheBackend>,

    #[arg(long, env = "REDIS_ADDR", value_name = "ADDR")]
    redis_addr: Option<String>,

    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Run without any cache store
    #[arg(long)]
    no_cache: bool,

    /// Write Prometheus metrics to this file on exit
    #[arg(long, value_name = "FILE")]
    metrics_path: Option<PathBuf>,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the available enrichers and exit
    #[arg(long)]
    list_enrichers: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(enrichers) = &self.enrichers {
            config.pipeline.enrichers = enrichers
                .iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if self.strict {
            config.pipeline.resolution_mode = ResolutionMode::Strict;
        }
        if let Some(policy) = self.on_duplicate {
            config.pipeline.duplicate_policy = policy;
        }
        if let Some(secs) = self.row_timeout {
            config.pipeline.row_timeout_secs = secs;
        }
        if let Some(backend) = self.cache {
            config.cache.backend = backend;
        }
        if self.redis_addr.is_some() {
            config.cache.redis_addr = self.redis_addr.clone();
        }
        if self.redis_password.is_some() {
            config.cache.redis_password = self.redis_password.clone();
        }
        if self.github_token.is_some() {
            config.github.token = self.github_token.clone();
        }
        if self.no_cache {
            // Nothing to connect to, so nothing to validate
            config.cache.backend = CacheBackend::Memory;
        }
        if self.metrics_path.is_some() {
            config.observability.metrics_path = self.metrics_path.clone();
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("github_enricher={0},git={0}", level)));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the CSV
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    Ok(config)
}

/// Commit lookup chain plus the API client, if any, so it can be verified
fn commit_lookup(
    config: &GitHubConfig,
) -> anyhow::Result<(Arc<dyn CommitLookup>, Option<Arc<GitHubApiClient>>)> {
    let clone: Arc<dyn CommitLookup> = Arc::new(GitCloneClient::new(config));

    let api = match &config.token {
        Some(token) if !token.is_empty() => Some(Arc::new(GitHubApiClient::new(config)?)),
        _ => None,
    };

    let lookup: Arc<dyn CommitLookup> = match &api {
        Some(api) if config.fallback_to_clone => {
            Arc::new(FallbackCommitLookup::new(api.clone(), clone))
        }
        Some(api) => api.clone() as Arc<dyn CommitLookup>,
        None => {
            info!("No GitHub token configured, reading commits from shallow fetches only");
            clone
        }
    };

    let memoized = MemoizedCommitLookup::new(lookup, 10_000, Duration::from_secs(3600));
    Ok((Arc::new(memoized), api))
}

async fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let (commits, api) = commit_lookup(&config.github)?;
    let genders = Arc::new(GenderizeClient::new(&config.gender)?);
    let universe = standard_enrichers(commits, genders);

    if cli.list_enrichers {
        for enricher in &universe {
            let cache_key = if enricher.cacheable() {
                enricher.cache_key_fields().join(",")
            } else {
                "-".to_string()
            };
            println!(
                "{:<20} deps={:<20} cache_key={}",
                enricher.field_name(),
                enricher.dependencies().join(","),
                cache_key
            );
        }
        return Ok(());
    }

    config.validate()?;
    info!("Starting github-enricher v{}", env!("CARGO_PKG_VERSION"));

    if let Some(api) = &api {
        api.verify().await.context("GitHub token check failed")?;
    }

    let selected = select_enrichers(&universe, &config.pipeline.enrichers)?;
    let mut pipeline = EnrichmentPipeline::new(selected, config.pipeline.clone());

    if cli.no_cache {
        warn!("Running without a cache store; every lookup hits its collaborator");
    } else {
        let store = create_store(&config.cache)
            .await
            .context("Failed to initialize cache store")?;
        info!(backend = store.backend(), "Cache store ready");
        pipeline = pipeline.with_cache(store);
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let stats = pipeline.run(stdin.lock(), stdout.lock()).await?;

    info!(
        rows = stats.rows_processed,
        field_failures = stats.field_failures,
        success_rate = stats.success_rate(),
        "Done"
    );
    Ok(())
}

/// Log line for a failed run.
///
/// Field-local error kinds only reach here from startup checks (token
/// verification, connecting to the cache store).
fn describe_failure(e: &anyhow::Error) -> String {
    match e.downcast_ref::<AppError>() {
        Some(app) if app.is_fatal() => format!("[{}] {:#}", app.error_code(), e),
        Some(app) => format!("[{}] startup check failed: {:#}", app.error_code(), e),
        None => format!("{:#}", e),
    }
}

fn write_metrics(config: &Config) {
    if let Some(path) = &config.observability.metrics_path {
        if let Err(e) = std::fs::write(path, gather_metrics()) {
            warn!(path = %path.display(), "Failed to write metrics: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info", cli.json_logs);
            error!("{}", describe_failure(&e));
            return ExitCode::FAILURE;
        }
    };

    init_tracing(
        &config.observability.log_level,
        config.observability.json_logs,
    );
    init_metrics();

    let result = run(&cli, &config).await;
    write_metrics(&config);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", describe_failure(&e));
            ExitCode::FAILURE
        }
    }
}
