// Embeddings module
// Providers that turn chunk text into fixed-dimensionality vectors

pub mod ollama;
pub mod openai;

use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::{Config, EmbeddingProvider};
use crate::{AssistantError, Result};

pub use ollama::OllamaEmbeddings;
pub use openai::OpenAiEmbeddings;

pub(crate) const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// An embedding backend. Vectors from one model id are never comparable to
/// vectors from another; a collection records the model id it was built with
/// and refuses to load under a different one.
pub trait Embedder {
    /// Identifier of the underlying model, persisted in the collection manifest
    fn model_id(&self) -> &str;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, preserving order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Construct the embedding provider selected in the configuration.
/// The choice is made once; mixing providers within one collection is
/// rejected at load time via the manifest model id.
#[inline]
pub fn embedder_from_config(config: &Config) -> Result<Box<dyn Embedder>> {
    match config.embedding.provider {
        EmbeddingProvider::Openai => Ok(Box::new(OpenAiEmbeddings::new(&config.embedding)?)),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbeddings::new(&config.embedding)?)),
    }
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Run a request closure with retries on server and transport errors,
/// backing off exponentially between attempts.
pub(crate) fn request_with_retry<F>(attempts: u32, mut request_fn: F) -> Result<String>
where
    F: FnMut() -> std::result::Result<String, ureq::Error>,
{
    let mut last_error = None;

    for attempt in 1..=attempts {
        debug!("HTTP request attempt {}/{}", attempt, attempts);

        match request_fn() {
            Ok(response_text) => return Ok(response_text),
            Err(error) => {
                let should_retry = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 {
                            warn!("Server error (status {}), attempt {}/{}", status, attempt, attempts);
                            true
                        } else {
                            return Err(AssistantError::Embedding(format!(
                                "client error: HTTP {status}"
                            )));
                        }
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!("Transport error: {}, attempt {}/{}", error, attempt, attempts);
                        true
                    }
                    _ => false,
                };

                if !should_retry {
                    return Err(AssistantError::Embedding(format!(
                        "non-retryable error: {error}"
                    )));
                }

                last_error = Some(error);

                if attempt < attempts {
                    let delay = Duration::from_millis(
                        EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000,
                    );
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All retry attempts failed");

    Err(AssistantError::Embedding(
        last_error.map_or_else(
            || "request failed after retries".to_string(),
            |e| format!("request failed after retries: {e}"),
        ),
    ))
}
