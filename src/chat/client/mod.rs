#[cfg(test)]
mod tests;

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::ChatConfig;
use crate::embeddings::build_agent;
use crate::{AssistantError, Result};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Message role on the chat completions wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An opaque text-generation backend: messages in, answer (or a lazy
/// sequence of answer deltas) out.
pub trait ChatModel {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    fn stream(&self, messages: &[ChatMessage]) -> Result<ChatStream>;
}

/// A finite, single-pass sequence of answer text deltas. Not restartable;
/// the caller concatenates the deltas. An error item ends the stream.
pub struct ChatStream {
    inner: Box<dyn Iterator<Item = Result<String>>>,
}

impl ChatStream {
    #[inline]
    pub fn new(inner: impl Iterator<Item = Result<String>> + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl Iterator for ChatStream {
    type Item = Result<String>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Blocking client for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    api_base: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenAiChatClient {
    /// Create a client from the chat configuration. The API key is read from
    /// the `OPENAI_API_KEY` environment variable.
    #[inline]
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            AssistantError::Config(format!("{API_KEY_ENV} environment variable is not set"))
        })?;

        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &ChatConfig, api_key: String) -> Result<Self> {
        let api_base = Url::parse(config.api_base.trim_end_matches('/'))
            .map_err(|e| AssistantError::Config(format!("invalid chat api_base: {e}")))?;

        Ok(Self {
            api_base,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
        })
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.api_base.as_str().trim_end_matches('/')
        )
    }

    fn send(&self, request: &CompletionRequest<'_>) -> Result<ureq::Body> {
        let request_json = serde_json::to_string(request).map_err(|e| {
            AssistantError::Generation(format!("failed to serialize chat request: {e}"))
        })?;

        let url = self.endpoint();
        debug!(
            "Requesting chat completion from {} with {} messages",
            url,
            request.messages.len()
        );

        // A failed question is surfaced, never silently retried.
        let response = self
            .agent
            .post(url.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key).as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(generation_error)?;

        Ok(response.into_body())
    }
}

impl ChatModel for OpenAiChatClient {
    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let response_text = self
            .send(&request)?
            .read_to_string()
            .map_err(|e| AssistantError::Generation(format!("failed to read response: {e}")))?;

        let response: CompletionResponse = serde_json::from_str(&response_text).map_err(|e| {
            AssistantError::Generation(format!("failed to parse chat response: {e}"))
        })?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                AssistantError::Generation("chat response contained no choices".to_string())
            })?;

        debug!("Received answer of {} characters", answer.len());
        Ok(answer)
    }

    #[inline]
    fn stream(&self, messages: &[ChatMessage]) -> Result<ChatStream> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        };

        let body = self.send(&request)?;

        Ok(ChatStream::new(SseDeltaStream {
            lines: BufReader::new(body.into_reader()).lines(),
            done: false,
        }))
    }
}

/// Iterator over the `data:` lines of a server-sent-events response body,
/// yielding the content deltas.
struct SseDeltaStream {
    lines: std::io::Lines<BufReader<ureq::BodyReader<'static>>>,
    done: bool,
}

impl Iterator for SseDeltaStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(AssistantError::Generation(format!(
                        "failed to read stream: {e}"
                    ))));
                }
                Some(Ok(line)) => line,
            };

            let Some(payload) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();

            if payload == "[DONE]" {
                self.done = true;
                return None;
            }

            let chunk: StreamChunk = match serde_json::from_str(payload) {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.done = true;
                    return Some(Err(AssistantError::Generation(format!(
                        "failed to parse stream chunk: {e}"
                    ))));
                }
            };

            if let Some(content) = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
            {
                if !content.is_empty() {
                    return Some(Ok(content));
                }
            }
        }

        None
    }
}

fn generation_error(error: ureq::Error) -> AssistantError {
    match error {
        ureq::Error::Timeout(_) => {
            AssistantError::Generation(format!("chat completion timed out: {error}"))
        }
        ureq::Error::StatusCode(code) => {
            AssistantError::Generation(format!("chat completion failed: HTTP {code}"))
        }
        other => AssistantError::Generation(format!("chat completion failed: {other}")),
    }
}
