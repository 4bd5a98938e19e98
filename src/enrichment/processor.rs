use crate::enrichment::models::{EnrichContext, FieldError, FieldMap, ProcessedRow, ResolvedChain};
use crate::error::{AppError, Result};
use crate::metrics::ENRICHER_METRICS;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout_at;
use tracing::debug;

/// Applies a resolved enricher chain to one row at a time
pub struct RowProcessor {
    chain: Arc<ResolvedChain>,
    row_timeout: Duration,
}

impl RowProcessor {
    pub fn new(chain: Arc<ResolvedChain>, row_timeout: Duration) -> Self {
        Self { chain, row_timeout }
    }

    pub fn chain(&self) -> &ResolvedChain {
        &self.chain
    }

    /// Enrich one data row.
    ///
    /// Only a row whose width differs from the input header is an error; enricher
    /// failures and timeouts leave an empty value and are reported in
    /// [`ProcessedRow::errors`].
    pub async fn process(&self, row_number: u64, record: Vec<String>) -> Result<ProcessedRow> {
        let header = &self.chain.input_header;
        if record.len() != header.len() {
            return Err(AppError::MalformedRow {
                row: row_number,
                expected: header.len(),
                found: record.len(),
            });
        }

        let mut values: FieldMap = header.iter().cloned().zip(record.iter().cloned()).collect();
        let mut fields = record;
        fields.reserve(self.chain.enrichers.len());
        let mut errors = Vec::new();

        let ctx = EnrichContext::new(row_number, self.row_timeout);

        for enricher in &self.chain.enrichers {
            let field = enricher.field_name();

            let elapsed = || {
                AppError::Timeout(format!(
                    "row deadline of {}s elapsed",
                    self.row_timeout.as_secs()
                ))
            };

            // Past the deadline nothing else is started for this row
            let outcome = if ctx.is_expired() {
                Err(elapsed())
            } else {
                match timeout_at(ctx.deadline, enricher.enrich(&ctx, &values)).await {
                    Ok(result) => result,
                    Err(_) => Err(elapsed()),
                }
            };

            let value = match outcome {
                Ok(value) => value,
                Err(error) => {
                    ENRICHER_METRICS
                        .field_failures
                        .with_label_values(&[field, error.error_code()])
                        .inc();
                    debug!(row = row_number, field = %field, "Enricher failed: {}", error);
                    errors.push(FieldError {
                        field: field.to_string(),
                        error,
                    });
                    String::new()
                }
            };

            values.insert(field.to_string(), value.clone());
            fields.push(value);
        }

        Ok(ProcessedRow { fields, errors })
    }
}
