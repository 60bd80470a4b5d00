use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_qa_core::config::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_API_BASE, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_K,
};
use pdf_qa_core::{
    AnswerGenerator, CharacterNgramEmbedder, ChatSettings, ChunkingConfig, CleanupStatus,
    CreateOutcome, Embedder, EmbeddingSettings, IndexError, IngestOutcome, IngestReport,
    IngestionTask, LopdfExtractor, OpenAiChatModel, OpenAiEmbedder, QaService, RagConfig,
    RecursiveSplitter, RetrievalConfig, SearchType, StorageConfig, UpdateFallback, UpdateOutcome,
    VectorIndex, VectorStore,
};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the persisted vector index.
    #[arg(long, env = "PDF_QA_INDEX_PATH", default_value = "data/vector_index")]
    index_path: PathBuf,

    /// Staging directory for PDFs awaiting ingestion. Removed after each run.
    #[arg(long, env = "PDF_QA_UPLOAD_DIR", default_value = "data/uploads")]
    upload_dir: PathBuf,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "OPENAI_API_BASE", default_value = DEFAULT_OPENAI_API_BASE)]
    api_base: String,

    #[arg(long, env = "PDF_QA_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "PDF_QA_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    #[arg(long, env = "PDF_QA_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Maximum characters per chunk.
    #[arg(long, default_value_t = 1_000)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks.
    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    #[arg(long, default_value = "similarity")]
    search_type: SearchType,

    /// Number of chunks retrieved per question.
    #[arg(long, env = "PDF_QA_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Fail an update over an unreadable index instead of replacing the index
    /// with the new documents only.
    #[arg(long, default_value_t = false)]
    strict_update: bool,

    /// Embed with the local character n-gram model instead of the remote API.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "PDF_QA_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Stage PDFs into the upload directory and index them.
    Ingest {
        /// PDF files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents.
    Ask {
        question: String,
    },
    /// Show whether an index exists and what it holds.
    Status,
}

impl Cli {
    fn rag_config(&self) -> RagConfig {
        RagConfig {
            embedding: EmbeddingSettings {
                model: self.embedding_model.clone(),
                api_base: self.api_base.clone(),
                ..EmbeddingSettings::default()
            },
            chat: ChatSettings {
                model: self.chat_model.clone(),
                temperature: self.temperature,
                api_base: self.api_base.clone(),
            },
            chunking: ChunkingConfig {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            },
            retrieval: RetrievalConfig {
                search_type: self.search_type,
                k: self.top_k,
            },
            storage: StorageConfig {
                index_path: self.index_path.clone(),
                upload_dir: self.upload_dir.clone(),
            },
            update_fallback: if self.strict_update {
                UpdateFallback::Propagate
            } else {
                UpdateFallback::RecreateFromNewChunks
            },
        }
    }

    fn api_key(&self) -> String {
        self.openai_api_key.clone().unwrap_or_default()
    }
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }

    Ok(())
}

fn build_store(cli: &Cli, config: &RagConfig) -> anyhow::Result<VectorStore> {
    let embedder: Arc<dyn Embedder> = if cli.offline {
        Arc::new(CharacterNgramEmbedder::default())
    } else {
        Arc::new(OpenAiEmbedder::new(&config.embedding, cli.api_key())?)
    };

    Ok(VectorStore::new(
        config.storage.index_path.clone(),
        embedder,
        config.update_fallback,
    ))
}

/// Copies `files` into the upload directory, refusing anything that is not a
/// PDF and any two inputs that would land on the same file name.
async fn stage_uploads(upload_dir: &Path, files: &[PathBuf]) -> anyhow::Result<usize> {
    if files.is_empty() {
        bail!("no files were given to ingest");
    }

    let mut staged_names = HashMap::new();
    for file in files {
        let is_pdf = file
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            bail!("{} is not a PDF file", file.display());
        }

        let Some(name) = file.file_name() else {
            bail!("{} has no file name", file.display());
        };
        if let Some(previous) = staged_names.insert(name, file) {
            bail!(
                "{} and {} share the file name {}; rename one before ingesting",
                previous.display(),
                file.display(),
                name.to_string_lossy()
            );
        }
    }

    tokio::fs::create_dir_all(upload_dir)
        .await
        .with_context(|| format!("cannot create upload directory {}", upload_dir.display()))?;

    for (name, file) in &staged_names {
        tokio::fs::copy(file, upload_dir.join(name))
            .await
            .with_context(|| format!("cannot stage {}", file.display()))?;
        info!(file = %file.display(), "staged file for ingestion");
    }

    Ok(staged_names.len())
}

fn print_report(report: &IngestReport) {
    match &report.outcome {
        IngestOutcome::NoDocuments(cause) => println!("no documents ingested ({cause:?})"),
        IngestOutcome::NoChunks(failure) => println!("no chunks produced ({failure:?})"),
        IngestOutcome::Created(CreateOutcome::Created { chunks }) => {
            println!("created index with {chunks} chunks")
        }
        IngestOutcome::Created(CreateOutcome::Skipped)
        | IngestOutcome::Updated(UpdateOutcome::Skipped) => println!("index unchanged"),
        IngestOutcome::Updated(UpdateOutcome::Appended { added, total }) => {
            println!("added {added} chunks, index now holds {total}")
        }
        IngestOutcome::Updated(UpdateOutcome::Initialized { added }) => {
            println!("index directory held no index; created one with {added} chunks")
        }
        IngestOutcome::Updated(UpdateOutcome::Recreated { cause, added }) => println!(
            "existing index could not be extended ({cause}); \
             recreated with {added} new chunks only"
        ),
        IngestOutcome::Failed { stage, error } => {
            println!("ingestion failed during {stage:?}: {error}")
        }
    }

    println!(
        "pdf_files={} pages={} chunks={} skipped={}",
        report.pdf_files,
        report.pages,
        report.chunks,
        report.skipped_files.len()
    );
    for skipped in &report.skipped_files {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    if let CleanupStatus::Failed(reason) = &report.cleanup {
        println!("upload directory was not removed: {reason}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = cli.rag_config();
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        index_path = %config.storage.index_path.display(),
        offline = cli.offline,
        "pdf-qa boot"
    );

    match &cli.command {
        Command::Ingest { files } => {
            let staged = stage_uploads(&config.storage.upload_dir, files).await?;
            println!("staged {staged} file(s), processing...");

            let task = Arc::new(IngestionTask::new(
                Arc::new(LopdfExtractor),
                RecursiveSplitter::new(config.chunking),
                build_store(&cli, &config)?,
            ));
            let report = task.spawn(config.storage.upload_dir.clone()).await?;

            print_report(&report);
            if !report.succeeded() {
                bail!("ingestion did not complete");
            }
        }
        Command::Ask { question } => {
            let chat = OpenAiChatModel::new(&config.chat, cli.api_key())?;
            let qa = QaService::new(
                build_store(&cli, &config)?,
                AnswerGenerator::new(Arc::new(chat)),
                config.retrieval,
            );

            let answer = qa.ask(question).await?;
            println!("{}", answer.answer);
            println!();
            for (position, source) in answer.sources.iter().enumerate() {
                println!(
                    "[{}] {} page={} score={:.4}",
                    position + 1,
                    source.source,
                    source.page,
                    source.score
                );
                println!("{}", source.content);
            }
        }
        Command::Status => match VectorIndex::open(&config.storage.index_path).await {
            Ok(index) => {
                println!("index: {}", config.storage.index_path.display());
                println!("entries: {}", index.len());
                println!("embedding_model: {}", index.embedding_model());
                println!("dimensions: {}", index.dimensions());
                println!("created_at: {}", index.created_at().to_rfc3339());
                println!("updated_at: {}", index.updated_at().to_rfc3339());
            }
            Err(IndexError::NotFound(path)) => {
                println!("no index at {}; ingest documents first", path.display());
            }
            Err(error) => {
                warn!(%error, "index is unreadable");
                return Err(error.into());
            }
        },
    }

    Ok(())
}
