use crate::enrichment::enrichers::Enricher;
use crate::enrichment::models::{DuplicatePolicy, ResolutionMode, ResolutionPolicy, ResolvedChain};
use crate::error::{AppError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Select the enrichers that can run against `header`, in declaration order.
///
/// A dependency is satisfied by an input column or by an enricher accepted
/// earlier in the same pass; later enrichers never count. That keeps this a
/// single linear pass with no cycle detection.
pub fn resolve(
    header: &[String],
    universe: &[Arc<dyn Enricher>],
    policy: ResolutionPolicy,
) -> Result<ResolvedChain> {
    let mut output_header = header.to_vec();
    let mut known: HashSet<&str> = header.iter().map(String::as_str).collect();
    let mut accepted: Vec<Arc<dyn Enricher>> = Vec::new();

    'universe: for enricher in universe {
        let field = enricher.field_name();

        if known.contains(field) {
            match policy.on_duplicate {
                DuplicatePolicy::Skip => {
                    debug!(enricher = %field, "Column already present, skipping enricher");
                    continue;
                }
                DuplicatePolicy::Fail => {
                    return Err(AppError::DuplicateColumn {
                        field: field.to_string(),
                    });
                }
            }
        }

        for dep in enricher.dependencies() {
            if !known.contains(dep.as_str()) {
                match policy.mode {
                    ResolutionMode::Permissive => {
                        debug!(
                            enricher = %field,
                            missing = %dep,
                            "Dependency unavailable, dropping enricher"
                        );
                        continue 'universe;
                    }
                    ResolutionMode::Strict => {
                        return Err(AppError::UnmetDependency {
                            enricher: field.to_string(),
                            missing_field: dep.clone(),
                        });
                    }
                }
            }
        }

        known.insert(field);
        output_header.push(field.to_string());
        accepted.push(Arc::clone(enricher));
    }

    Ok(ResolvedChain {
        input_header: header.to_vec(),
        output_header,
        enrichers: accepted,
    })
}
