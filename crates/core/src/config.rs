//! Process-wide settings, passed explicitly into every component.

use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-5";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TOP_K: usize = 3;

/// Resolves `path` below an API base URL, keeping the base's last segment.
pub(crate) fn api_endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&base)?.join(path)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub storage: StorageConfig,
    pub update_fallback: UpdateFallback,
}

impl RagConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;
        self.retrieval.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub api_base: String,
    /// Inputs per embeddings request.
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            batch_size: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub api_base: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Similarity,
}

impl FromStr for SearchType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "similarity" => Ok(Self::Similarity),
            other => Err(ConfigError::UnknownSearchType(other.to_string())),
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Similarity => f.write_str("similarity"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub search_type: SearchType,
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_type: SearchType::Similarity,
            k: DEFAULT_TOP_K,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub index_path: PathBuf,
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/vector_index"),
            upload_dir: PathBuf::from("data/uploads"),
        }
    }
}

/// What `update` does when the existing index cannot be loaded or extended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateFallback {
    /// Replace the index with one built from the new chunks only.
    /// Previously indexed content is lost.
    #[default]
    RecreateFromNewChunks,
    /// Return the error and leave the index on disk untouched.
    Propagate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_pipeline() {
        let config = RagConfig::default();
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.chat.model, "gpt-5");
        assert_eq!(config.chunking.chunk_size, 1_000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.search_type, SearchType::Similarity);
        assert_eq!(config.update_fallback, UpdateFallback::RecreateFromNewChunks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn search_type_parses_only_similarity() {
        assert_eq!("Similarity".parse::<SearchType>().ok(), Some(SearchType::Similarity));
        assert!(matches!(
            "mmr".parse::<SearchType>(),
            Err(ConfigError::UnknownSearchType(value)) if value == "mmr"
        ));
    }

    #[test]
    fn api_endpoint_keeps_version_segment() -> Result<(), url::ParseError> {
        assert_eq!(
            api_endpoint("https://api.openai.com/v1", "embeddings")?.as_str(),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            api_endpoint("http://localhost:8080/v1/", "chat/completions")?.as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
        Ok(())
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let retrieval = RetrievalConfig {
            k: 0,
            ..RetrievalConfig::default()
        };
        assert!(matches!(retrieval.validate(), Err(ConfigError::InvalidTopK)));
    }

    #[test]
    fn partial_json_config_falls_back_to_defaults() -> Result<(), serde_json::Error> {
        let config: RagConfig =
            serde_json::from_str(r#"{ "retrieval": { "k": 5 }, "update_fallback": "propagate" }"#)?;
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.update_fallback, UpdateFallback::Propagate);
        assert_eq!(config.chunking.chunk_size, 1_000);
        Ok(())
    }
}
