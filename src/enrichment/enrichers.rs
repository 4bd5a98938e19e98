use crate::enrichment::models::{EnrichContext, FieldMap};
use crate::error::{AppError, Result};
use crate::integrations::{CommitLookup, GenderClassifier};
use crate::names;
use async_trait::async_trait;
use std::sync::Arc;

/// A named unit of computation producing one output column
#[async_trait]
pub trait Enricher: Send + Sync + 'static {
    /// Output column name
    fn field_name(&self) -> &str;

    /// Fields that must exist (as input columns or earlier enricher outputs)
    fn dependencies(&self) -> &[String];

    /// Fields whose values identify a cached result
    fn cache_key_fields(&self) -> &[String] {
        self.dependencies()
    }

    /// Whether results are worth memoizing in the cache store
    fn cacheable(&self) -> bool {
        true
    }

    /// Compute the field value from the row-so-far
    async fn enrich(&self, ctx: &EnrichContext, row: &FieldMap) -> Result<String>;
}

impl std::fmt::Debug for dyn Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("field", &self.field_name())
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

/// Look up a dependency value, rejecting missing or blank values
pub fn required_value<'a>(row: &'a FieldMap, field: &str) -> Result<&'a str> {
    match row.get(field).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Validation(format!("field '{}' is empty", field))),
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Which commit author attribute a [`CommitAuthorEnricher`] emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAttribute {
    Email,
    Name,
}

/// Commit author enricher - resolves `repo_name` + `commit` to an author attribute
pub struct CommitAuthorEnricher {
    field: String,
    attribute: CommitAttribute,
    dependencies: Vec<String>,
    cache_key: Vec<String>,
    commits: Arc<dyn CommitLookup>,
}

impl CommitAuthorEnricher {
    pub fn new(field: &str, attribute: CommitAttribute, commits: Arc<dyn CommitLookup>) -> Self {
        Self {
            field: field.to_string(),
            attribute,
            dependencies: fields(&["repo_name", "commit"]),
            // Commit hashes identify the author on their own
            cache_key: fields(&["commit"]),
            commits,
        }
    }

    pub fn email(commits: Arc<dyn CommitLookup>) -> Self {
        Self::new("email", CommitAttribute::Email, commits)
    }

    pub fn name(commits: Arc<dyn CommitLookup>) -> Self {
        Self::new("name", CommitAttribute::Name, commits)
    }
}

#[async_trait]
impl Enricher for CommitAuthorEnricher {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn cache_key_fields(&self) -> &[String] {
        &self.cache_key
    }

    async fn enrich(&self, _ctx: &EnrichContext, row: &FieldMap) -> Result<String> {
        let repo = required_value(row, "repo_name")?;
        let commit = required_value(row, "commit")?;

        let author = self.commits.lookup(repo, commit).await?;
        Ok(match self.attribute {
            CommitAttribute::Email => author.email,
            CommitAttribute::Name => author.name,
        })
    }
}

/// First-name enricher - cleaned first token of `name`
pub struct FirstNameEnricher {
    dependencies: Vec<String>,
}

impl FirstNameEnricher {
    pub fn new() -> Self {
        Self {
            dependencies: fields(&["name"]),
        }
    }
}

impl Default for FirstNameEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Enricher for FirstNameEnricher {
    fn field_name(&self) -> &str {
        "first_name"
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn enrich(&self, _ctx: &EnrichContext, row: &FieldMap) -> Result<String> {
        let name = required_value(row, "name")?;
        names::first_name(name).ok_or_else(|| {
            AppError::Validation(format!("no usable first name in '{}'", name))
        })
    }
}

/// Which classification output a [`GenderEnricher`] emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenderOutput {
    Label,
    Probability,
}

/// Gender enricher - classifies `first_name`
pub struct GenderEnricher {
    field: String,
    output: GenderOutput,
    dependencies: Vec<String>,
    classifier: Arc<dyn GenderClassifier>,
}

impl GenderEnricher {
    pub fn label(classifier: Arc<dyn GenderClassifier>) -> Self {
        Self {
            field: "gender".to_string(),
            output: GenderOutput::Label,
            dependencies: fields(&["first_name"]),
            classifier,
        }
    }

    pub fn probability(classifier: Arc<dyn GenderClassifier>) -> Self {
        Self {
            field: "gender_probability".to_string(),
            output: GenderOutput::Probability,
            dependencies: fields(&["first_name"]),
            classifier,
        }
    }
}

#[async_trait]
impl Enricher for GenderEnricher {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn enrich(&self, _ctx: &EnrichContext, row: &FieldMap) -> Result<String> {
        let first_name = required_value(row, "first_name")?;
        let classification = self.classifier.classify(first_name).await?;
        Ok(match self.output {
            GenderOutput::Label => classification.label,
            GenderOutput::Probability => format!("{:.2}", classification.probability),
        })
    }
}

/// Build the enricher universe, in declaration (priority) order
pub fn standard_enrichers(
    commits: Arc<dyn CommitLookup>,
    genders: Arc<dyn GenderClassifier>,
) -> Vec<Arc<dyn Enricher>> {
    vec![
        Arc::new(CommitAuthorEnricher::email(commits.clone())),
        Arc::new(CommitAuthorEnricher::name(commits)),
        Arc::new(FirstNameEnricher::new()),
        Arc::new(GenderEnricher::label(genders.clone())),
        Arc::new(GenderEnricher::probability(genders)),
    ]
}

/// Pick the named enrichers out of the universe, keeping universe order
pub fn select_enrichers(
    universe: &[Arc<dyn Enricher>],
    names: &[String],
) -> Result<Vec<Arc<dyn Enricher>>> {
    for name in names {
        if !universe.iter().any(|e| e.field_name() == name) {
            let available: Vec<&str> = universe.iter().map(|e| e.field_name()).collect();
            return Err(AppError::UnknownEnricher {
                name: name.clone(),
                available: available.join(", "),
            });
        }
    }

    Ok(universe
        .iter()
        .filter(|e| names.iter().any(|n| n == e.field_name()))
        .cloned()
        .collect())
}
