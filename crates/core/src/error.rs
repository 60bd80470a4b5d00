use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("background extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures talking to a remote embedding or chat-completion API.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {details}")]
    Api {
        provider: String,
        status: u16,
        details: String,
    },

    #[error("invalid response from {provider}: {details}")]
    MalformedResponse { provider: String, details: String },

    #[error("missing api key for {0}")]
    MissingApiKey(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no vector index found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("vector index at {} is corrupt: {details}", path.display())]
    Corrupt { path: PathBuf, details: String },

    #[error("index was built with embedding model {stored}, current model is {current}")]
    ModelMismatch { stored: String, current: String },

    #[error("embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("embedding count {embeddings} doesn't match chunk count {chunks}")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("embedding failed: {0}")]
    Embedding(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("vector index not found at {}; please ingest documents first", .0.display())]
    MissingIndex(PathBuf),

    #[error("question is empty")]
    EmptyQuestion,

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("query embedding failed: {0}")]
    Retrieval(ProviderError),

    #[error("answer generation failed: {0}")]
    Generation(ProviderError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid chunking config: {0}")]
    Chunking(String),

    #[error("unsupported search type: {0}")]
    UnknownSearchType(String),

    #[error("retrieval k must be at least 1")]
    InvalidTopK,
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
