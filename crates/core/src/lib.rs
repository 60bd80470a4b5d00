pub mod chat;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod qa;
pub mod retriever;
pub mod store;
pub mod traits;

pub use chat::OpenAiChatModel;
pub use chunking::{ChunkFailure, ChunkReport, ChunkingConfig, RecursiveSplitter};
pub use config::{
    ChatSettings, EmbeddingSettings, RagConfig, RetrievalConfig, SearchType, StorageConfig,
    UpdateFallback,
};
pub use embeddings::{CharacterNgramEmbedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{AnswerError, ConfigError, IndexError, IngestError, ProviderError};
pub use extractor::{extract_page_texts, LopdfExtractor, PdfExtractor};
pub use index::{IndexEntry, VectorIndex};
pub use ingest::{discover_pdf_files, load_documents, EmptyLoadCause, LoadReport, SkippedPdf};
pub use models::{Answer, Chunk, DocumentPage, RetrievedChunk, SourceDocument};
pub use orchestrator::{
    CleanupStatus, IndexMode, IngestOutcome, IngestReport, IngestStage, IngestionTask,
};
pub use qa::{AnswerGenerator, QaService};
pub use retriever::Retriever;
pub use store::{CreateOutcome, UpdateOutcome, VectorStore};
pub use traits::{ChatModel, Embedder};
