use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_qa_core::{
    AnswerError, AnswerGenerator, CharacterNgramEmbedder, ChatModel, ChunkingConfig, CleanupStatus,
    CreateOutcome, Embedder, IngestOutcome, IngestionTask, LopdfExtractor, ProviderError,
    QaService, RecursiveSplitter, RetrievalConfig, UpdateFallback, UpdateOutcome, VectorStore,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Answers with the first context line mentioning a year.
struct YearFromContextModel;

#[async_trait]
impl ChatModel for YearFromContextModel {
    fn model_id(&self) -> &str {
        "year-from-context"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let answer = prompt
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find(|word| word.len() == 4 && word.starts_with("19"))
            .map(|year| format!("Acme Corp was founded in {year}."))
            .unwrap_or_else(|| "I don't know.".to_string());
        Ok(answer)
    }
}

fn write_pdf(path: &Path, lines: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content_id = doc.add_object(Stream::new(dictionary! {}, Content { operations }.encode()?));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

struct Pipeline {
    ingestion: IngestionTask,
    qa: QaService,
}

fn pipeline(index_path: &Path) -> Pipeline {
    let embedder: Arc<dyn Embedder> = Arc::new(CharacterNgramEmbedder::default());
    let store = VectorStore::new(index_path, embedder, UpdateFallback::default());
    Pipeline {
        ingestion: IngestionTask::new(
            Arc::new(LopdfExtractor),
            RecursiveSplitter::new(ChunkingConfig::default()),
            store.clone(),
        ),
        qa: QaService::new(
            store,
            AnswerGenerator::new(Arc::new(YearFromContextModel)),
            RetrievalConfig::default(),
        ),
    }
}

#[tokio::test]
async fn ingested_pdf_answers_questions_with_sources() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempdir()?;
    let uploads = root.path().join("uploads");
    std::fs::create_dir_all(&uploads)?;
    let pdf_path = uploads.join("acme.pdf");
    write_pdf(&pdf_path, &["Acme Corp was founded in 1990 in Berlin."])?;

    let pipeline = pipeline(&root.path().join("vector_index"));
    let report = pipeline.ingestion.run(&uploads).await;

    assert_eq!(
        report.outcome,
        IngestOutcome::Created(CreateOutcome::Created { chunks: 1 })
    );
    assert_eq!(report.cleanup, CleanupStatus::Removed);
    assert!(!uploads.exists());

    let answer = pipeline.qa.ask("When was Acme Corp founded?").await?;

    assert!(answer.answer.contains("1990"), "unexpected answer: {}", answer.answer);
    assert!(answer
        .sources
        .iter()
        .any(|source| source.source == pdf_path.to_string_lossy()));
    assert!(answer.sources.iter().any(|source| source.content.contains("Berlin")));
    Ok(())
}

#[tokio::test]
async fn later_uploads_extend_the_index() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempdir()?;
    let pipeline = pipeline(&root.path().join("vector_index"));

    let first = root.path().join("first");
    std::fs::create_dir_all(&first)?;
    write_pdf(&first.join("acme.pdf"), &["Acme Corp was founded in 1990 in Berlin."])?;
    pipeline.ingestion.run(&first).await;

    let second = root.path().join("second");
    std::fs::create_dir_all(&second)?;
    write_pdf(&second.join("gnome.pdf"), &["The garden gnome factory opened in Hamburg."])?;
    let report = pipeline.ingestion.run(&second).await;

    assert_eq!(
        report.outcome,
        IngestOutcome::Updated(UpdateOutcome::Appended { added: 1, total: 2 })
    );

    let answer = pipeline.qa.ask("When was Acme Corp founded?").await?;
    assert!(answer.answer.contains("1990"));
    assert_eq!(answer.sources.len(), 2);
    Ok(())
}

#[tokio::test]
async fn asking_before_ingestion_reports_missing_index() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempdir()?;
    let pipeline = pipeline(&root.path().join("vector_index"));

    let result = pipeline.qa.ask("When was Acme Corp founded?").await;

    assert!(matches!(result, Err(AnswerError::MissingIndex(_))));
    Ok(())
}
