//! Background ingestion: load the upload directory, chunk it, create or
//! extend the vector index, then remove the upload directory.

use crate::chunking::{ChunkFailure, RecursiveSplitter};
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::ingest::{load_documents, EmptyLoadCause, SkippedPdf};
use crate::store::{CreateOutcome, UpdateOutcome, VectorStore};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Load,
    Chunk,
    Index(IndexMode),
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    NoDocuments(EmptyLoadCause),
    NoChunks(ChunkFailure),
    Created(CreateOutcome),
    Updated(UpdateOutcome),
    Failed { stage: IngestStage, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStatus {
    Removed,
    AlreadyAbsent,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub upload_dir: PathBuf,
    pub outcome: IngestOutcome,
    /// Stages in the order they were entered.
    pub stages: Vec<IngestStage>,
    pub pdf_files: usize,
    pub pages: usize,
    pub chunks: usize,
    pub skipped_files: Vec<SkippedPdf>,
    pub cleanup: CleanupStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestReport {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, IngestOutcome::Failed { .. })
    }
}

#[derive(Default)]
struct Progress {
    stages: Vec<IngestStage>,
    pdf_files: usize,
    pages: usize,
    chunks: usize,
    skipped_files: Vec<SkippedPdf>,
}

/// Removes the upload directory when dropped, so an unwinding task still
/// cleans up. `finish` does the same removal and reports how it went.
struct CleanupGuard {
    dir: Option<PathBuf>,
}

impl CleanupGuard {
    fn new(dir: &Path) -> Self {
        Self {
            dir: Some(dir.to_path_buf()),
        }
    }

    async fn finish(mut self) -> CleanupStatus {
        let Some(dir) = self.dir.clone() else {
            return CleanupStatus::AlreadyAbsent;
        };

        let status = match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(dir = %dir.display(), "removed upload directory");
                CleanupStatus::Removed
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                CleanupStatus::AlreadyAbsent
            }
            Err(error) => {
                error!(dir = %dir.display(), %error, "failed to remove upload directory");
                CleanupStatus::Failed(error.to_string())
            }
        };
        self.dir = None;
        status
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(error) = std::fs::remove_dir_all(&dir) {
                if error.kind() != std::io::ErrorKind::NotFound {
                    error!(dir = %dir.display(), %error, "failed to remove upload directory");
                }
            }
        }
    }
}

pub struct IngestionTask {
    extractor: Arc<dyn PdfExtractor>,
    splitter: RecursiveSplitter,
    store: VectorStore,
}

impl IngestionTask {
    pub fn new(
        extractor: Arc<dyn PdfExtractor>,
        splitter: RecursiveSplitter,
        store: VectorStore,
    ) -> Self {
        Self {
            extractor,
            splitter,
            store,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Runs the task on the tokio runtime. Dropping the handle does not stop it.
    pub fn spawn(self: Arc<Self>, upload_dir: PathBuf) -> JoinHandle<IngestReport> {
        tokio::spawn(async move { self.run(&upload_dir).await })
    }

    /// Ingests everything in `upload_dir` and removes the directory afterwards,
    /// whatever happened before. Failures are logged and recorded in the
    /// report rather than returned.
    pub async fn run(&self, upload_dir: &Path) -> IngestReport {
        let started_at = Utc::now();
        let guard = CleanupGuard::new(upload_dir);
        info!(upload_dir = %upload_dir.display(), "ingestion task started");

        let mut progress = Progress::default();
        let outcome = self.process(upload_dir, &mut progress).await;

        progress.stages.push(IngestStage::Cleanup);
        let cleanup = guard.finish().await;
        let finished_at = Utc::now();

        info!(
            upload_dir = %upload_dir.display(),
            outcome = ?outcome,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "ingestion task finished"
        );

        IngestReport {
            upload_dir: upload_dir.to_path_buf(),
            outcome,
            stages: progress.stages,
            pdf_files: progress.pdf_files,
            pages: progress.pages,
            chunks: progress.chunks,
            skipped_files: progress.skipped_files,
            cleanup,
            started_at,
            finished_at,
        }
    }

    async fn process(&self, upload_dir: &Path, progress: &mut Progress) -> IngestOutcome {
        progress.stages.push(IngestStage::Load);
        let extractor = Arc::clone(&self.extractor);
        let dir = upload_dir.to_path_buf();
        let load = tokio::task::spawn_blocking(move || load_documents(&dir, &*extractor));
        let loaded = match load.await {
            Ok(loaded) => loaded,
            Err(join_error) => return failed(IngestStage::Load, IngestError::from(join_error)),
        };

        progress.pdf_files = loaded.pdf_files.len();
        progress.pages = loaded.pages.len();
        progress.skipped_files = loaded.skipped_files.clone();

        if let Some(cause) = loaded.empty_cause() {
            warn!(
                upload_dir = %upload_dir.display(),
                ?cause,
                "no documents loaded, nothing to index"
            );
            return IngestOutcome::NoDocuments(cause);
        }

        progress.stages.push(IngestStage::Chunk);
        let report = self.splitter.split_pages(&loaded.pages);
        if report.chunks.is_empty() {
            let failure = report.failure.unwrap_or(ChunkFailure::NoText);
            warn!(?failure, "no chunks produced, nothing to index");
            return IngestOutcome::NoChunks(failure);
        }
        progress.chunks = report.chunks.len();

        let mode = if self.store.exists() {
            IndexMode::Update
        } else {
            IndexMode::Create
        };
        progress.stages.push(IngestStage::Index(mode));

        match mode {
            IndexMode::Create => match self.store.create(&report.chunks).await {
                Ok(outcome) => IngestOutcome::Created(outcome),
                Err(error) => failed(IngestStage::Index(mode), error),
            },
            IndexMode::Update => match self.store.update(&report.chunks).await {
                Ok(outcome) => IngestOutcome::Updated(outcome),
                Err(error) => failed(IngestStage::Index(mode), error),
            },
        }
    }
}

fn failed<E: std::error::Error>(stage: IngestStage, error: E) -> IngestOutcome {
    error!(?stage, %error, details = ?error, "ingestion task failed");
    IngestOutcome::Failed {
        stage,
        error: error.to_string(),
    }
}
