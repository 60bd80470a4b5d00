use serde::{Deserialize, Serialize};

/// Text of one PDF page together with where it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentPage {
    pub text: String,
    pub source_path: String,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_path: String,
    pub page: u32,
    /// Position of the chunk within its page.
    pub chunk_index: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Squared L2 distance to the query; lower is closer.
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    pub source: String,
    pub content: String,
    pub page: u32,
    pub score: f32,
}

impl From<RetrievedChunk> for SourceDocument {
    fn from(value: RetrievedChunk) -> Self {
        Self {
            source: value.chunk.source_path,
            content: value.chunk.text,
            page: value.chunk.page,
            score: value.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
}
