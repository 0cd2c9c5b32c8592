
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECONDS, Embedder, build_agent, request_with_retry,
};
use crate::config::EmbeddingConfig;
use crate::{AssistantError, Result};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Hosted embedding provider speaking the OpenAI embeddings API
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    api_base: Url,
    api_key: String,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    /// Create a client from the embedding configuration. The API key is read
    /// from the `OPENAI_API_KEY` environment variable, never from the config
    /// file.
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            AssistantError::Config(format!("{API_KEY_ENV} environment variable is not set"))
        })?;

        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let api_base = Url::parse(config.api_base.trim_end_matches('/'))
            .map_err(|e| AssistantError::Config(format!("invalid embedding api_base: {e}")))?;

        Ok(Self {
            api_base,
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size,
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base.as_str().trim_end_matches('/'));

        let request_json = serde_json::to_string(&EmbeddingsRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        })
        .map_err(|e| AssistantError::Embedding(format!("failed to serialize request: {e}")))?;

        let response_text = request_with_retry(self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Authorization", format!("Bearer {}", self.api_key).as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text).map_err(|e| {
            AssistantError::Embedding(format!("failed to parse embeddings response: {e}"))
        })?;

        if response.data.len() != texts.len() {
            return Err(AssistantError::Embedding(format!(
                "mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for OpenAiEmbeddings {
    #[inline]
    fn model_id(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let mut vectors = self.embed_single_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| AssistantError::Embedding("empty embeddings response".to_string()))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            vectors.extend(self.embed_single_batch(batch)?);
        }

        Ok(vectors)
    }
}
