use crate::config::{api_endpoint, ChatSettings};
use crate::error::ProviderError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

const OPENAI: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Single-turn client for the OpenAI `/chat/completions` endpoint.
pub struct OpenAiChatModel {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(settings: &ChatSettings, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey("openai chat".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            endpoint: api_endpoint(&settings.api_base, "chat/completions")?,
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "requesting chat completion");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                temperature: self.temperature,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
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

        let payload: ChatResponse = response.json().await?;
        first_choice_text(payload)
    }
}

fn first_choice_text(payload: ChatResponse) -> Result<String, ProviderError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse {
            provider: OPENAI.to_string(),
            details: "chat completion had no message content".to_string(),
        })
}
