use crate::config::{RetrievalConfig, SearchType};
use crate::error::AnswerError;
use crate::index::VectorIndex;
use crate::models::RetrievedChunk;
use crate::traits::Embedder;
use std::sync::Arc;
use tracing::debug;

/// Similarity search over one loaded index with a fixed `k`.
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self {
            index,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> RetrievalConfig {
        self.config
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, AnswerError> {
        let vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(AnswerError::Retrieval)?;

        let hits = match self.config.search_type {
            SearchType::Similarity => self.index.search(&vector, self.config.k)?,
        };

        debug!(
            k = self.config.k,
            hits = hits.len(),
            best_score = hits.first().map(|hit| hit.score),
            "retrieved chunks"
        );
        Ok(hits)
    }
}
