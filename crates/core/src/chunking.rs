use crate::error::{ConfigError, IngestError};
use crate::models::{Chunk, DocumentPage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Minimum number of characters shared by consecutive chunks of a page.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Chunking("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Chunking(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Shortest chunk the splitter cuts before reaching the end of a page.
    fn min_cut_len(&self) -> usize {
        cmp::max(self.chunk_overlap + 1, self.chunk_size / 2)
    }
}

/// Places where a chunk may end, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Character,
}

impl Boundary {
    pub const ORDER: [Boundary; 5] = [
        Boundary::Paragraph,
        Boundary::Line,
        Boundary::Sentence,
        Boundary::Word,
        Boundary::Character,
    ];

    /// Whether a chunk may end right before `chars[pos]`. `pos` must be in `1..chars.len()`.
    fn allows_cut(self, chars: &[char], pos: usize) -> bool {
        let prev = chars[pos - 1];
        let next = chars[pos];
        if self == Boundary::Character {
            return true;
        }
        if prev.is_whitespace() || !next.is_whitespace() {
            return false;
        }
        match self {
            Boundary::Paragraph => line_breaks_in_gap(chars, pos) >= 2,
            Boundary::Line => line_breaks_in_gap(chars, pos) >= 1,
            Boundary::Sentence => matches!(prev, '.' | '!' | '?'),
            Boundary::Word | Boundary::Character => true,
        }
    }
}

/// Number of `\n` in the whitespace run starting at `pos`.
fn line_breaks_in_gap(chars: &[char], pos: usize) -> usize {
    chars[pos..]
        .iter()
        .take_while(|c| c.is_whitespace())
        .filter(|c| **c == '\n')
        .count()
}

/// Why a chunking pass produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFailure {
    NoInput,
    NoText,
    InvalidConfig(String),
}

#[derive(Debug, Clone, Default)]
pub struct ChunkReport {
    pub chunks: Vec<Chunk>,
    pub failure: Option<ChunkFailure>,
}

impl ChunkReport {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn failed(failure: ChunkFailure) -> Self {
        Self {
            chunks: Vec::new(),
            failure: Some(failure),
        }
    }
}

/// Splits text on the coarsest boundary that fits, falling back through
/// [`Boundary::ORDER`], with a fixed character overlap between chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split_text(&self, text: &str) -> Result<Vec<String>, IngestError> {
        self.config
            .validate()
            .map_err(|error| IngestError::InvalidChunkConfig(error.to_string()))?;

        let normalized = normalize_line_breaks(text);
        let chars = normalized.trim().chars().collect::<Vec<_>>();
        if chars.is_empty() {
            return Ok(Vec::new());
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        loop {
            if chars.len() - start <= self.config.chunk_size {
                pieces.push(chars[start..].iter().collect());
                break;
            }

            let end = self.cut_position(&chars, start);
            pieces.push(chars[start..end].iter().collect());
            start = self.next_start(&chars, start, end);
        }

        Ok(pieces)
    }

    /// Splits every page, carrying its source metadata onto each chunk.
    ///
    /// Never fails: an unusable configuration or text-less input produces an
    /// empty report whose `failure` says why.
    pub fn split_pages(&self, pages: &[DocumentPage]) -> ChunkReport {
        if pages.is_empty() {
            return ChunkReport::failed(ChunkFailure::NoInput);
        }

        let mut chunks = Vec::new();
        for page in pages {
            let pieces = match self.split_text(&page.text) {
                Ok(pieces) => pieces,
                Err(error) => {
                    error!(%error, "failed to split documents into chunks");
                    return ChunkReport::failed(ChunkFailure::InvalidConfig(error.to_string()));
                }
            };

            for (index, text) in pieces.into_iter().enumerate() {
                let chunk_index = index as u32;
                chunks.push(Chunk {
                    chunk_id: make_chunk_id(&page.source_path, page.page, chunk_index, &text),
                    source_path: page.source_path.clone(),
                    page: page.page,
                    chunk_index,
                    text,
                });
            }
        }

        info!(pages = pages.len(), chunks = chunks.len(), "split documents into chunks");

        if chunks.is_empty() {
            return ChunkReport::failed(ChunkFailure::NoText);
        }

        ChunkReport {
            chunks,
            failure: None,
        }
    }

    fn cut_position(&self, chars: &[char], start: usize) -> usize {
        let lowest = start + self.config.min_cut_len();
        let highest = start + self.config.chunk_size;

        for boundary in Boundary::ORDER {
            if let Some(pos) = (lowest..=highest)
                .rev()
                .find(|pos| boundary.allows_cut(chars, *pos))
            {
                return pos;
            }
        }

        highest
    }

    /// Start of the chunk following `[start, end)`: the last word start that
    /// keeps at least `chunk_overlap` characters shared, without reaching back
    /// so far that the next chunk could end before `end`.
    fn next_start(&self, chars: &[char], start: usize, end: usize) -> usize {
        let latest = end - self.config.chunk_overlap;
        let earliest = cmp::max(start + 1, end - self.config.min_cut_len());

        (earliest..=latest)
            .rev()
            .find(|pos| chars[pos - 1].is_whitespace() && !chars[*pos].is_whitespace())
            .unwrap_or(latest)
    }
}

pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{a0}', " ")
}

fn make_chunk_id(source_path: &str, page: u32, index: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
