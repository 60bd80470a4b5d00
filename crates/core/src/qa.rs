//! Answer generation and the ask flow on top of the persisted index.

use crate::config::RetrievalConfig;
use crate::error::{AnswerError, IndexError};
use crate::models::{Answer, RetrievedChunk, SourceDocument};
use crate::retriever::Retriever;
use crate::store::VectorStore;
use crate::traits::ChatModel;
use std::sync::Arc;
use tracing::{info, warn};

const INSTRUCTIONS: &str = "Use the following pieces of information to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const ANSWER_DIRECTIVE: &str = "Only return the helpful answer below and nothing else.";

pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Context and question are inserted verbatim; text inside either is never
/// treated as a placeholder.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("{INSTRUCTIONS}\n\nContext: {context}\nQuestion: {question}\n\n{ANSWER_DIRECTIVE}\n")
}

pub struct AnswerGenerator {
    chat: Arc<dyn ChatModel>,
}

impl AnswerGenerator {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Retrieves context for `question` and asks the chat model about it.
    ///
    /// The model's text is returned unmodified; the retrieved chunks come back
    /// as sources in retrieval order.
    pub async fn answer(
        &self,
        retriever: &Retriever,
        question: &str,
    ) -> Result<Answer, AnswerError> {
        let hits = retriever.retrieve(question).await?;
        let prompt = build_prompt(&format_context(&hits), question);

        let answer = self
            .chat
            .complete(&prompt)
            .await
            .map_err(AnswerError::Generation)?;

        info!(model = %self.chat.model_id(), sources = hits.len(), "answer generated");
        Ok(Answer {
            answer,
            sources: hits.into_iter().map(SourceDocument::from).collect(),
        })
    }
}

/// Answers questions against whatever index currently sits at the store's path.
pub struct QaService {
    store: VectorStore,
    generator: AnswerGenerator,
    retrieval: RetrievalConfig,
}

impl QaService {
    pub fn new(store: VectorStore, generator: AnswerGenerator, retrieval: RetrievalConfig) -> Self {
        Self {
            store,
            generator,
            retrieval,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, AnswerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        if !self.store.exists() {
            warn!(
                path = %self.store.path().display(),
                "question asked before any documents were ingested"
            );
            return Err(AnswerError::MissingIndex(self.store.path().to_path_buf()));
        }

        let index = match self.store.load().await {
            Ok(index) => index,
            Err(IndexError::NotFound(path)) => return Err(AnswerError::MissingIndex(path)),
            Err(error) => return Err(error.into()),
        };

        let retriever = Retriever::new(index, self.store.embedder(), self.retrieval);
        self.generator.answer(&retriever, question).await
    }
}
