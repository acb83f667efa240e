//! Error types for the translation pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MtError {
    /// Provider misconfiguration (missing key, rejected request)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Backend timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    #[error("Translation error: {0}")]
    TranslationError(String),

    /// The backend answered with a different number of texts than it was sent.
    #[error("Backend returned {actual} translations for {expected} texts")]
    ResponseMismatch { expected: usize, actual: usize },

    #[error("Anchor token error: {0}")]
    AnchorTokenError(String),

    #[error("Dictionary error: {0}")]
    DictionaryError(String),

    #[error("Reassembly error: {0}")]
    ReassemblyError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        MtError::NetworkError(err.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;

/// A dictionary problem that was recovered from while loading or resolving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadDiagnostic {
    #[error("dictionary has no header row")]
    EmptyHeader,

    #[error("line {line}: expected {expected} cells, found {found}; row skipped")]
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: wildcard counts differ between columns ({counts:?}); row skipped")]
    WildcardMismatch { line: u64, counts: Vec<usize> },

    #[error("line {line}: adjacent wildcards in '{pattern}'; entry skipped")]
    AdjacentWildcards { line: u64, pattern: String },

    #[error("line {line}: '{source_text}' already defined on line {first_line}; later entry ignored")]
    DuplicateEntry {
        line: u64,
        first_line: u64,
        source_text: String,
    },

    #[error("language '{0}' is not a dictionary column")]
    ColumnNotFound(String),
}
