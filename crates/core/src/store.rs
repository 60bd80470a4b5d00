use crate::config::UpdateFallback;
use crate::error::IndexError;
use crate::index::VectorIndex;
use crate::models::Chunk;
use crate::traits::Embedder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { chunks: usize },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Appended { added: usize, total: usize },
    /// There was no index file yet, so one was written from the new chunks.
    Initialized { added: usize },
    /// The existing index could not be extended and was replaced by one
    /// holding only the new chunks.
    Recreated { cause: String, added: usize },
    Skipped,
}

/// The vector index living at one path, plus the embedder it is built with.
///
/// `create` and `update` on the same store are serialized; `load` never
/// waits on them.
#[derive(Clone)]
pub struct VectorStore {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    fallback: UpdateFallback,
    write_lock: Arc<Mutex<()>>,
}

impl VectorStore {
    pub fn new(
        path: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        fallback: UpdateFallback,
    ) -> Self {
        Self {
            path: path.into(),
            embedder,
            fallback,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Whether an index file sits at the path. A bare directory does not count.
    pub fn exists(&self) -> bool {
        VectorIndex::file_path(&self.path).is_file()
    }

    /// Embeds `chunks` and writes them as a brand-new index, replacing any
    /// index already at the path.
    pub async fn create(&self, chunks: &[Chunk]) -> Result<CreateOutcome, IndexError> {
        let _guard = self.write_lock.lock().await;
        self.create_locked(chunks).await
    }

    pub async fn load(&self) -> Result<VectorIndex, IndexError> {
        info!(path = %self.path.display(), "loading vector index");
        let index = VectorIndex::open(&self.path).await?;

        if index.embedding_model() != self.embedder.model_id() {
            return Err(IndexError::ModelMismatch {
                stored: index.embedding_model().to_string(),
                current: self.embedder.model_id().to_string(),
            });
        }

        Ok(index)
    }

    /// Appends `new_chunks` to the existing index.
    ///
    /// With no index file at the path, a new index is written from
    /// `new_chunks` under either policy. If the index cannot be loaded,
    /// extended or saved, the configured [`UpdateFallback`] decides: either a
    /// new index with only `new_chunks` replaces it, or the error is returned
    /// and the index is left as it was.
    pub async fn update(&self, new_chunks: &[Chunk]) -> Result<UpdateOutcome, IndexError> {
        if new_chunks.is_empty() {
            info!("no new chunks to add to the vector index");
            return Ok(UpdateOutcome::Skipped);
        }

        let _guard = self.write_lock.lock().await;
        match self.append_locked(new_chunks).await {
            Ok(total) => {
                info!(
                    path = %self.path.display(),
                    added = new_chunks.len(),
                    total,
                    "vector index updated"
                );
                Ok(UpdateOutcome::Appended {
                    added: new_chunks.len(),
                    total,
                })
            }
            Err(IndexError::NotFound(_)) => {
                info!(path = %self.path.display(), "no index file to extend, creating one");
                self.create_locked(new_chunks).await?;
                Ok(UpdateOutcome::Initialized {
                    added: new_chunks.len(),
                })
            }
            Err(error) => match self.fallback {
                UpdateFallback::Propagate => Err(error),
                UpdateFallback::RecreateFromNewChunks => {
                    warn!(
                        path = %self.path.display(),
                        %error,
                        "failed to update vector index, recreating it from the new chunks only"
                    );
                    self.create_locked(new_chunks).await?;
                    Ok(UpdateOutcome::Recreated {
                        cause: error.to_string(),
                        added: new_chunks.len(),
                    })
                }
            },
        }
    }

    async fn create_locked(&self, chunks: &[Chunk]) -> Result<CreateOutcome, IndexError> {
        if chunks.is_empty() {
            info!("no chunks provided, vector index not created");
            return Ok(CreateOutcome::Skipped);
        }

        let vectors = self.embed(chunks).await?;
        let index =
            VectorIndex::from_embeddings(self.embedder.model_id(), chunks.to_vec(), vectors)?;
        index.save(&self.path).await?;

        info!(path = %self.path.display(), chunks = chunks.len(), "vector index created");
        Ok(CreateOutcome::Created {
            chunks: chunks.len(),
        })
    }

    async fn append_locked(&self, chunks: &[Chunk]) -> Result<usize, IndexError> {
        let mut index = self.load().await?;
        let vectors = self.embed(chunks).await?;
        index.add(chunks.to_vec(), vectors)?;
        index.save(&self.path).await?;
        Ok(index.len())
    }

    async fn embed(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, IndexError> {
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
        Ok(self.embedder.embed_documents(&texts).await?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::error::ProviderError;
    use crate::models::Chunk;
    use crate::traits::Embedder;
    use async_trait::async_trait;

    pub fn chunk(source: &str, index: u32, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{source}#{index}"),
            source_path: source.to_string(),
            page: 1,
            chunk_index: index,
            text: text.to_string(),
        }
    }

    pub struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn embed_documents(
            &self,
            _texts: &[String],
        ) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::Api {
                provider: "fake".to_string(),
                status: 429,
                details: "rate limited".to_string(),
            })
        }
    }
}
