use crate::extractor::PdfExtractor;
use crate::models::DocumentPage;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Lists the `.pdf` files directly inside `folder`, sorted by path.
///
/// A missing folder yields an empty list. Entries that cannot be read are
/// logged and left out.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    scan_pdf_files(folder).0
}

fn scan_pdf_files(folder: &Path) -> (Vec<PathBuf>, Vec<String>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();

    for item in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = match item {
            Ok(entry) => entry,
            Err(error) => {
                warn!(folder = %folder.display(), %error, "failed to read upload directory entry");
                errors.push(error.to_string());
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    (files, errors)
}

#[derive(Debug, Clone)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

/// Why a load produced no pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyLoadCause {
    DirectoryMissing,
    /// The directory exists but listing it failed.
    DirectoryUnreadable,
    NoPdfFiles,
    AllFilesFailed,
    NoPages,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub pages: Vec<DocumentPage>,
    pub pdf_files: Vec<PathBuf>,
    pub skipped_files: Vec<SkippedPdf>,
    /// Errors hit while listing the directory itself.
    pub listing_errors: Vec<String>,
    pub directory_missing: bool,
}

impl LoadReport {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn empty_cause(&self) -> Option<EmptyLoadCause> {
        if !self.pages.is_empty() {
            None
        } else if self.directory_missing {
            Some(EmptyLoadCause::DirectoryMissing)
        } else if self.pdf_files.is_empty() && !self.listing_errors.is_empty() {
            Some(EmptyLoadCause::DirectoryUnreadable)
        } else if self.pdf_files.is_empty() {
            Some(EmptyLoadCause::NoPdfFiles)
        } else if self.skipped_files.len() == self.pdf_files.len() {
            Some(EmptyLoadCause::AllFilesFailed)
        } else {
            Some(EmptyLoadCause::NoPages)
        }
    }
}

/// Extracts every page of every PDF in `folder`.
///
/// A file that fails to extract is logged and recorded in
/// [`LoadReport::skipped_files`]; the remaining files are still loaded.
pub fn load_documents(folder: &Path, extractor: &dyn PdfExtractor) -> LoadReport {
    if !folder.is_dir() {
        warn!(folder = %folder.display(), "upload directory not found");
        return LoadReport {
            directory_missing: true,
            ..LoadReport::default()
        };
    }

    let (pdf_files, listing_errors) = scan_pdf_files(folder);
    let mut pages = Vec::new();
    let mut skipped_files = Vec::new();

    for path in &pdf_files {
        match extractor.extract_pages(path) {
            Ok(file_pages) => pages.extend(file_pages),
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to load pdf, skipping");
                skipped_files.push(SkippedPdf {
                    path: path.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        folder = %folder.display(),
        files = pdf_files.len(),
        skipped = skipped_files.len(),
        pages = pages.len(),
        "loaded document pages"
    );

    LoadReport {
        pages,
        pdf_files,
        skipped_files,
        listing_errors,
        directory_missing: false,
    }
}
