use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source document not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

/// Failures of the query pipeline and of the stores it owns.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("vector index not found at {0}; run the train command first")]
    IndexNotFound(PathBuf),

    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("query expansion failed: {0}")]
    ExpansionError(String),

    #[error("generation failed: {0}")]
    GenerationError(String),

    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("embedding failed ({model}): {details}")]
    Embedding { model: String, details: String },

    #[error("could not load history from {path}: {details}")]
    HistoryLoadError { path: PathBuf, details: String },

    #[error("could not save history to {path}: {details}")]
    HistorySaveError { path: PathBuf, details: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl RagError {
    /// Only a missing index stops a session before it starts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RagError::IndexNotFound(_))
    }

    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            RagError::GenerationError(_) | RagError::GenerationTimeout(_)
        )
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
