use crate::enrichment::cached::CachedEnricher;
use crate::enrichment::enrichers::Enricher;
use crate::enrichment::models::{EnrichmentConfig, PipelineStats, ResolvedChain};
use crate::enrichment::processor::RowProcessor;
use crate::enrichment::resolver::resolve;
use crate::error::{AppError, Result};
use crate::metrics::ENRICHER_METRICS;
use crate::state::CacheStore;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Streaming CSV enrichment pipeline
pub struct EnrichmentPipeline {
    /// Enricher universe, in declaration order
    universe: Vec<Arc<dyn Enricher>>,

    /// Optional memoization store for cacheable enrichers
    store: Option<Arc<dyn CacheStore>>,

    /// Configuration
    config: Arc<EnrichmentConfig>,
}

impl EnrichmentPipeline {
    /// Create a pipeline over `universe` without a cache store
    pub fn new(universe: Vec<Arc<dyn Enricher>>, config: EnrichmentConfig) -> Self {
        Self {
            universe,
            store: None,
            config: Arc::new(config),
        }
    }

    /// Memoize cacheable enrichers in `store`
    pub fn with_cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Resolve the chain for `header` and wrap it with the cache store
    pub fn prepare(&self, header: &[String]) -> Result<ResolvedChain> {
        let mut chain = resolve(header, &self.universe, self.config.policy())?;

        if let Some(store) = &self.store {
            debug!(backend = store.backend(), "Wrapping cacheable enrichers");
            chain.enrichers = chain
                .enrichers
                .into_iter()
                .map(|enricher| CachedEnricher::wrap(enricher, Arc::clone(store)))
                .collect();
        }

        Ok(chain)
    }

    /// Enrich every record of `input` and write the result to `output`.
    ///
    /// The output header is written and flushed before the first data row, and
    /// every row is flushed as soon as it is enriched, so memory stays flat
    /// regardless of input size. Field failures are logged and counted; only
    /// header, I/O, CSV and row-shape errors abort the run.
    pub async fn run<R: Read, W: Write>(&self, input: R, output: W) -> Result<PipelineStats> {
        let start = Instant::now();

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        let mut writer = WriterBuilder::new().from_writer(output);

        let mut record = StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Err(AppError::MissingHeader);
        }
        let header: Vec<String> = record.iter().map(str::to_string).collect();

        let chain = self.prepare(&header)?;
        info!(
            input = ?chain.input_header,
            enrichers = ?chain.enricher_names(),
            "Resolved enricher chain"
        );

        writer.write_record(&chain.output_header)?;
        writer.flush()?;

        let mut stats = PipelineStats {
            output_header: chain.output_header.clone(),
            ..Default::default()
        };
        let processor = RowProcessor::new(Arc::new(chain), self.config.row_timeout());

        let mut row_number: u64 = 0;
        while reader.read_record(&mut record)? {
            row_number += 1;
            let values: Vec<String> = record.iter().map(str::to_string).collect();
            let processed = processor.process(row_number, values).await?;

            for failure in &processed.errors {
                warn!(
                    row = row_number,
                    field = %failure.field,
                    code = failure.error.error_code(),
                    "Enrichment failed: {}",
                    failure.error
                );
            }

            writer.write_record(&processed.fields)?;
            writer.flush()?;

            stats.rows_processed += 1;
            stats.field_failures += processed.errors.len() as u64;
            if !processed.is_complete() {
                stats.rows_with_failures += 1;
            }
            ENRICHER_METRICS.rows_processed.inc();
        }

        stats.duration = start.elapsed();
        info!(
            rows = stats.rows_processed,
            field_failures = stats.field_failures,
            rows_with_failures = stats.rows_with_failures,
            elapsed_ms = stats.duration.as_millis() as u64,
            "Enrichment finished"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::models::{DuplicatePolicy, ResolutionMode};
    use crate::enrichment::test_support::CountingEnricher;
    use crate::state::InMemoryStore;
    use std::io;

    fn commit_universe() -> (
        Arc<CountingEnricher>,
        Arc<CountingEnricher>,
        Vec<Arc<dyn Enricher>>,
    ) {
        let email = Arc::new(CountingEnricher::ok(
            "email",
            &["repo_name", "commit"],
            "a@x.com",
        ));
        let name = Arc::new(CountingEnricher::ok(
            "name",
            &["repo_name", "commit"],
            "Ann Lee",
        ));
        let universe: Vec<Arc<dyn Enricher>> = vec![email.clone(), name.clone()];
        (email, name, universe)
    }

    async fn run_to_string(
        pipeline: &EnrichmentPipeline,
        input: &str,
    ) -> Result<(String, PipelineStats)> {
        let mut out = Vec::new();
        let stats = pipeline.run(input.as_bytes(), &mut out).await?;
        Ok((String::from_utf8(out).unwrap(), stats))
    }

    /// Records the bytes written so far each time it is flushed
    #[derive(Default)]
    struct FlushRecorder {
        buf: Vec<u8>,
        snapshots: Vec<String>,
    }

    impl Write for FlushRecorder {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.snapshots.push(String::from_utf8_lossy(&self.buf).into_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let (_, _, universe) = commit_universe();
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let (out, stats) = run_to_string(&pipeline, "repo_name,commit\nfoo/bar,abc123\n")
            .await
            .unwrap();

        assert_eq!(out, "repo_name,commit,email,name\nfoo/bar,abc123,a@x.com,Ann Lee\n");
        assert_eq!(stats.rows_processed, 1);
        assert_eq!(stats.field_failures, 0);
        assert_eq!(stats.output_header.len(), 4);
    }

    #[tokio::test]
    async fn test_shared_store_computes_once_across_runs() {
        let (email, name, universe) = commit_universe();
        let store = Arc::new(InMemoryStore::new());
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default())
            .with_cache(store.clone());

        let input = "repo_name,commit\nfoo/bar,abc123\n";
        let (first, _) = run_to_string(&pipeline, input).await.unwrap();
        let (second, _) = run_to_string(&pipeline, input).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(email.calls(), 1);
        assert_eq!(name.calls(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_is_missing_header() {
        let (_, _, universe) = commit_universe();
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let err = run_to_string(&pipeline, "").await.unwrap_err();
        assert!(matches!(err, AppError::MissingHeader));
    }

    #[tokio::test]
    async fn test_header_only_input() {
        let (email, _, universe) = commit_universe();
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let (out, stats) = run_to_string(&pipeline, "repo_name,commit\n").await.unwrap();
        assert_eq!(out, "repo_name,commit,email,name\n");
        assert_eq!(stats.rows_processed, 0);
        assert_eq!(email.calls(), 0);
    }

    #[tokio::test]
    async fn test_field_failure_does_not_abort() {
        let universe: Vec<Arc<dyn Enricher>> = vec![
            Arc::new(CountingEnricher::failing("email", &["commit"])),
            Arc::new(CountingEnricher::ok("name", &["commit"], "Ann Lee")),
        ];
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let (out, stats) = run_to_string(&pipeline, "commit\nabc\ndef\n").await.unwrap();
        assert_eq!(out, "commit,email,name\nabc,,Ann Lee\ndef,,Ann Lee\n");
        assert_eq!(stats.rows_processed, 2);
        assert_eq!(stats.field_failures, 2);
        assert_eq!(stats.rows_with_failures, 2);
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_strict_resolution_fails_before_output() {
        let (_, _, universe) = commit_universe();
        let config = EnrichmentConfig {
            resolution_mode: ResolutionMode::Strict,
            ..Default::default()
        };
        let pipeline = EnrichmentPipeline::new(universe, config);

        let mut out = Vec::new();
        let err = pipeline
            .run("commit\nabc123\n".as_bytes(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnmetDependency { .. }));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_permissive_resolution_passes_rows_through() {
        let (_, _, universe) = commit_universe();
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let (out, _) = run_to_string(&pipeline, "commit\nabc123\n").await.unwrap();
        assert_eq!(out, "commit\nabc123\n");
    }

    #[tokio::test]
    async fn test_existing_column_is_rejected_by_default() {
        let (email, _, universe) = commit_universe();
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let mut out = Vec::new();
        let err = pipeline
            .run("repo_name,commit,email\nfoo/bar,abc,x\n".as_bytes(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateColumn { field } if field == "email"));
        assert!(out.is_empty());
        assert_eq!(email.calls(), 0);
    }

    #[tokio::test]
    async fn test_skip_policy_keeps_existing_column() {
        let (email, _, universe) = commit_universe();
        let config = EnrichmentConfig {
            duplicate_policy: DuplicatePolicy::Skip,
            ..Default::default()
        };
        let pipeline = EnrichmentPipeline::new(universe, config);

        let (out, _) = run_to_string(&pipeline, "repo_name,commit,email\nfoo/bar,abc,x\n")
            .await
            .unwrap();
        assert_eq!(out, "repo_name,commit,email,name\nfoo/bar,abc,x,Ann Lee\n");
        assert_eq!(email.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_row_aborts_after_good_rows() {
        let (_, _, universe) = commit_universe();
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let mut out = Vec::new();
        let err = pipeline
            .run(
                "repo_name,commit\nfoo/bar,abc\nonly-one-field\n".as_bytes(),
                &mut out,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MalformedRow { row: 2, .. }));
        let written = String::from_utf8(out).unwrap();
        assert!(written.ends_with("foo/bar,abc,a@x.com,Ann Lee\n"));
    }

    #[tokio::test]
    async fn test_flushes_header_then_each_row() {
        let (_, _, universe) = commit_universe();
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let mut recorder = FlushRecorder::default();
        pipeline
            .run(
                "repo_name,commit\nfoo/bar,abc\nfoo/bar,def\n".as_bytes(),
                &mut recorder,
            )
            .await
            .unwrap();

        assert!(recorder.snapshots.len() >= 3);
        assert_eq!(recorder.snapshots[0], "repo_name,commit,email,name\n");
        assert_eq!(
            recorder.snapshots[1],
            "repo_name,commit,email,name\nfoo/bar,abc,a@x.com,Ann Lee\n"
        );
        assert!(recorder.snapshots[2].ends_with("foo/bar,def,a@x.com,Ann Lee\n"));
    }

    #[tokio::test]
    async fn test_quoted_fields_round_trip() {
        let universe: Vec<Arc<dyn Enricher>> =
            vec![Arc::new(CountingEnricher::ok("name", &["commit"], "Lee, Ann"))];
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default());

        let (out, _) = run_to_string(&pipeline, "commit,note\nabc,\"a, b\"\n")
            .await
            .unwrap();
        assert_eq!(out, "commit,note,name\nabc,\"a, b\",\"Lee, Ann\"\n");
    }

    #[test]
    fn test_prepare_skips_cache_for_uncacheable() {
        let pure = Arc::new(CountingEnricher::derived("first_name", &["name"]).uncacheable());
        let remote = Arc::new(CountingEnricher::ok("gender", &["first_name"], "female"));
        let universe: Vec<Arc<dyn Enricher>> = vec![pure, remote];
        let pipeline = EnrichmentPipeline::new(universe, EnrichmentConfig::default())
            .with_cache(Arc::new(InMemoryStore::new()));

        let chain = pipeline.prepare(&["name".to_string()]).unwrap();
        assert_eq!(chain.enricher_names(), vec!["first_name", "gender"]);
    }
}
