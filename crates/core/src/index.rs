//! Flat (exact) vector index and its on-disk form.
//!
//! An index directory holds a single `index.json`. Saves write a temporary
//! file in the same directory and rename it over the old one, so a reader
//! sees either the previous complete index or the new one.

use crate::error::IndexError;
use crate::models::{Chunk, RetrievedChunk};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub const INDEX_FILE: &str = "index.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    version: u32,
    embedding_model: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(embedding_model: impl Into<String>, dimensions: usize) -> Self {
        let now = Utc::now();
        Self {
            version: FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions,
            created_at: now,
            updated_at: now,
            entries: Vec::new(),
        }
    }

    /// Builds an index whose dimension is taken from the first vector.
    pub fn from_embeddings(
        embedding_model: impl Into<String>,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
        let mut index = Self::new(embedding_model, dimensions);
        index.add(chunks, vectors)?;
        Ok(index)
    }

    pub fn add(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                chunks: chunks.len(),
                embeddings: vectors.len(),
            });
        }

        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                found: bad.len(),
            });
        }

        self.entries.extend(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry { chunk, vector }),
        );
        self.updated_at = Utc::now();
        Ok(())
    }

    /// The `k` entries closest to `query` by squared L2 distance, closest
    /// first; equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                found: query.len(),
            });
        }

        let mut scored = self
            .entries
            .iter()
            .map(|entry| (squared_l2(&entry.vector, query), entry))
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| left.0.total_cmp(&right.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| RetrievedChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    pub async fn save(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir).await?;

        let target = Self::file_path(dir);
        let staging = dir.join(format!(".{INDEX_FILE}.{}.tmp", Uuid::new_v4()));
        let bytes = serde_json::to_vec(self)?;

        fs::write(&staging, &bytes).await?;
        if let Err(error) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(error.into());
        }

        debug!(path = %target.display(), entries = self.entries.len(), "saved vector index");
        Ok(())
    }

    pub async fn open(dir: &Path) -> Result<Self, IndexError> {
        let target = Self::file_path(dir);
        let bytes = match fs::read(&target).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound(dir.to_path_buf()));
            }
            Err(error) => return Err(error.into()),
        };

        let index: Self =
            serde_json::from_slice(&bytes).map_err(|error| IndexError::Corrupt {
                path: target.clone(),
                details: error.to_string(),
            })?;
        index.check_consistency(&target)?;
        Ok(index)
    }

    fn check_consistency(&self, path: &Path) -> Result<(), IndexError> {
        if self.version != FORMAT_VERSION {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                details: format!("unsupported format version {}", self.version),
            });
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.vector.len() != self.dimensions)
        {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                details: format!(
                    "chunk {} has {} dimensions, index declares {}",
                    entry.chunk.chunk_id,
                    entry.vector.len(),
                    self.dimensions
                ),
            });
        }

        Ok(())
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            source_path: "/tmp/doc.pdf".to_string(),
            page: 1,
            chunk_index: 0,
            text: text.to_string(),
        }
    }

    fn sample_index() -> Result<VectorIndex, IndexError> {
        VectorIndex::from_embeddings(
            "test-model",
            vec![chunk("a", "alpha"), chunk("b", "beta"), chunk("c", "gamma")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
    }

    #[test]
    fn search_orders_by_distance_and_truncates() -> Result<(), IndexError> {
        let index = sample_index()?;
        let hits = index.search(&[1.0, 0.1], 2)?;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "a");
        assert_eq!(hits[1].chunk.chunk_id, "c");
        assert!(hits[0].score <= hits[1].score);
        Ok(())
    }

    #[test]
    fn ties_keep_insertion_order() -> Result<(), IndexError> {
        let index = VectorIndex::from_embeddings(
            "test-model",
            vec![chunk("first", "x"), chunk("second", "x")],
            vec![vec![0.5, 0.5], vec![0.5, 0.5]],
        )?;
        let hits = index.search(&[0.5, 0.5], 2)?;
        assert_eq!(hits[0].chunk.chunk_id, "first");
        assert_eq!(hits[1].chunk.chunk_id, "second");
        Ok(())
    }

    #[test]
    fn mismatched_dimensions_are_rejected() -> Result<(), IndexError> {
        let mut index = sample_index()?;
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 3),
            Err(IndexError::DimensionMismatch { expected: 2, found: 3 })
        ));
        assert!(matches!(
            index.add(vec![chunk("d", "delta")], vec![vec![1.0]]),
            Err(IndexError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.add(vec![chunk("d", "delta")], Vec::new()),
            Err(IndexError::CountMismatch { chunks: 1, embeddings: 0 })
        ));
        assert_eq!(index.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn save_then_open_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("index");
        let index = sample_index()?;

        index.save(&path).await?;
        let reopened = VectorIndex::open(&path).await?;

        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.embedding_model(), "test-model");
        assert_eq!(reopened.dimensions(), 2);
        assert_eq!(reopened.entries(), index.entries());

        let leftovers = std::fs::read_dir(&path)?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() != INDEX_FILE)
            .count();
        assert_eq!(leftovers, 0);
        Ok(())
    }

    #[tokio::test]
    async fn open_reports_missing_and_corrupt_indexes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let missing = dir.path().join("missing");
        assert!(matches!(
            VectorIndex::open(&missing).await,
            Err(IndexError::NotFound(_))
        ));

        let corrupt = dir.path().join("corrupt");
        std::fs::create_dir_all(&corrupt)?;
        std::fs::write(corrupt.join(INDEX_FILE), b"{ not json")?;
        assert!(matches!(
            VectorIndex::open(&corrupt).await,
            Err(IndexError::Corrupt { .. })
        ));
        Ok(())
    }
}
