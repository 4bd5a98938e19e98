use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors (bad identifiers, empty dependency values)
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network errors
    #[error("Network error: {0}")]
    Network(String),

    /// Cache store errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Integration errors
    #[error("Integration error ({integration_source}): {message}")]
    Integration { integration_source: String, message: String },

    /// Input stream had no header record
    #[error("Input has no header record")]
    MissingHeader,

    /// Strict resolution found an enricher whose dependency is not available
    #[error("Enricher '{enricher}' requires field '{missing_field}' which is neither an input column nor produced by an earlier enricher")]
    UnmetDependency {
        enricher: String,
        missing_field: String,
    },

    /// An enricher's output column already exists
    #[error("Column '{field}' already exists in the header")]
    DuplicateColumn { field: String },

    /// A data row does not line up with the header
    #[error("Malformed row {row}: expected {expected} fields, found {found}")]
    MalformedRow {
        row: u64,
        expected: usize,
        found: usize,
    },

    /// An enricher was requested by a name nobody declares
    #[error("Unknown enricher '{name}' (available: {available})")]
    UnknownEnricher { name: String, available: String },
}

impl AppError {
    /// Shorthand for an integration failure from a named collaborator
    pub fn integration(source: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Integration {
            integration_source: source.into(),
            message: message.into(),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Integration { .. } => "INTEGRATION_ERROR",
            AppError::MissingHeader => "MISSING_HEADER",
            AppError::UnmetDependency { .. } => "UNMET_DEPENDENCY",
            AppError::DuplicateColumn { .. } => "DUPLICATE_COLUMN",
            AppError::MalformedRow { .. } => "MALFORMED_ROW",
            AppError::UnknownEnricher { .. } => "UNKNOWN_ENRICHER",
        }
    }

    /// Whether this error ends the run (startup or stream failure) rather than
    /// degrading a single field.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Configuration(_)
                | AppError::Io(_)
                | AppError::Csv(_)
                | AppError::MissingHeader
                | AppError::UnmetDependency { .. }
                | AppError::DuplicateColumn { .. }
                | AppError::MalformedRow { .. }
                | AppError::UnknownEnricher { .. }
        )
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
