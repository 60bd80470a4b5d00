use crate::error::ProviderError;
use async_trait::async_trait;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier stored alongside an index so it is only reopened with the same model.
    fn model_id(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| ProviderError::MalformedResponse {
            provider: self.model_id().to_string(),
            details: "no embedding returned for query".to_string(),
        })
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
