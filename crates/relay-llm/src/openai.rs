//! Streaming client for OpenAI-compatible chat completions.
//!
//! Speaks `POST {base_url}/chat/completions`, which OpenAI, Ollama (`/v1`)
//! and Gemini's compatibility endpoint all accept. Streaming responses are
//! SSE; each `data:` line is a chunk whose `choices[0].delta.content` is the
//! next fragment.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::producer::{FragmentStream, ProducerError, ProducerResult};
use crate::sse::parse_sse_lines;

/// Connection settings for a [`ChatClient`].
#[derive(Clone, Debug)]
pub struct ChatClientConfig {
    /// Base URL, without `/chat/completions`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Bearer token, if the endpoint needs one.
    pub api_key: Option<String>,
    /// Connect timeout, and the total timeout for non-streaming calls.
    pub timeout: Duration,
}

/// One chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: &'static str,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    /// A system instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Client for one model on one endpoint. Cheap to share behind an `Arc`.
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatClientConfig,
}

impl ChatClient {
    /// Build a client.
    pub fn new(config: ChatClientConfig) -> ProducerResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Model identifier.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> ProducerResult<reqwest::Response> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            stream,
        };

        let mut builder = self.client.post(self.url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        if !stream {
            builder = builder.timeout(self.config.timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProducerError::Api {
                status: status.as_u16(),
                message: parse_api_error(&body, status.as_u16()),
            });
        }
        Ok(response)
    }

    /// Stream a completion as text fragments.
    pub async fn stream(&self, messages: &[ChatMessage]) -> ProducerResult<FragmentStream> {
        debug!(
            model = %self.config.model,
            message_count = messages.len(),
            "starting completion stream"
        );
        let response = self.send(messages, true).await?;

        let fragments = parse_sse_lines(response.bytes_stream()).filter_map(|line| {
            std::future::ready(match line {
                Ok(data) => parse_chunk(&data).transpose(),
                Err(e) => Some(Err(e)),
            })
        });

        Ok(Box::pin(fragments))
    }

    /// Run a completion to the end and return its text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> ProducerResult<String> {
        let response = self.send(messages, false).await?;
        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProducerError::Other {
                message: "completion returned no choices".into(),
            })
    }
}

/// Turn one SSE payload into an optional fragment.
///
/// Unparseable payloads are logged and skipped; an in-stream error object is
/// a failure.
fn parse_chunk(data: &str) -> ProducerResult<Option<String>> {
    let chunk: CompletionChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, len = data.len(), "skipping unparseable completion chunk");
            return Ok(None);
        }
    };

    if let Some(err) = chunk.error {
        return Err(ProducerError::Stream {
            message: err.message.unwrap_or_else(|| "unknown upstream error".into()),
        });
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty()))
}

/// Extract a message from an API error body.
fn parse_api_error(body: &str, status: u16) -> String {
    let value: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    // Gemini wraps the object in a one-element array.
    let root = value.get(0).unwrap_or(&value);
    root["error"]["message"]
        .as_str()
        .or_else(|| root["error"].as_str())
        .map_or_else(|| format!("HTTP {status}: {body}"), str::to_owned)
}
