use crate::config::{api_endpoint, EmbeddingSettings};
use crate::error::ProviderError;
use crate::traits::Embedder;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

const OPENAI: &str = "openai";

/// Hashed character-trigram embedder. Deterministic and offline, so indexes
/// built with it are reproducible.
#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
    model_id: String,
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("char-trigram-{dimensions}"),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings from the OpenAI `/embeddings` endpoint.
///
/// There is no retry: any transport or API error fails the whole call.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        settings: &EmbeddingSettings,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey("openai embeddings".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            endpoint: api_endpoint(&settings.api_base, "embeddings")?,
            api_key,
            model: settings.model.clone(),
            batch_size: settings.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        debug!(model = %self.model, batch_size = batch.len(), "requesting embeddings");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: OPENAI.to_string(),
                status: status.as_u16(),
                details,
            });
        }

        let payload: EmbeddingResponse = response.json().await?;
        order_embeddings(payload, batch.len())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

fn order_embeddings(
    payload: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if payload.data.len() != expected {
        return Err(ProviderError::MalformedResponse {
            provider: OPENAI.to_string(),
            details: format!("expected {expected} embeddings, got {}", payload.data.len()),
        });
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in payload.data {
        let index = item.index;
        let slot = slots.get_mut(index).filter(|slot| slot.is_none());
        let Some(slot) = slot else {
            return Err(ProviderError::MalformedResponse {
                provider: OPENAI.to_string(),
                details: format!("unexpected embedding index {index}"),
            });
        };
        *slot = Some(item.embedding);
    }

    Ok(slots.into_iter().flatten().collect())
}
