//! Anthropic Messages API generator.
//!
//! `complete` issues a plain Messages request; `stream` sets `"stream": true`
//! and decodes the server-sent event stream into text chunks.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::trait_def::{ChunkStream, GenerationError, GenerationRequest, Generator};

const API_VERSION: &str = "2023-06-01";

/// Connection settings for [`AnthropicClient`].
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    /// API root, without the trailing `/messages`.
    pub base_url: String,
    /// Limit for a whole `complete` call and for the response headers of a
    /// `stream` call.
    pub request_timeout: Duration,
    /// Longest gap allowed between two streamed events.
    pub idle_timeout: Duration,
}

impl AnthropicConfig {
    pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";
    pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Config for `api_key` with the default model, endpoint and timeouts.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Generator backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    http: reqwest::Client,
}

impl AnthropicClient {
    /// Create a client with a fresh HTTP connection pool.
    pub fn new(config: AnthropicConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| GenerationError::Config(format!("failed to build HTTP client: {e}")))?;
        Self::with_http_client(config, http)
    }

    /// Create a client that sends requests through `http`.
    pub fn with_http_client(
        config: AnthropicConfig,
        http: reqwest::Client,
    ) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::Config(
                "an Anthropic API key is required (set ANTHROPIC_API_KEY)".to_string(),
            ));
        }
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn messages_request(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> reqwest::RequestBuilder {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            stream,
        };

        self.http
            .post(format!(
                "{}/messages",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
    }
}

/// Send a request and turn transport failures and non-2xx statuses into
/// [`GenerationError`]s.
async fn send(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, GenerationError> {
    let response = builder
        .send()
        .await
        .map_err(|e| transport_error(&e, timeout))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(%status, "generation service returned an error status");
    Err(GenerationError::Service(api_error_message(status, &body)))
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::Service(format!("request failed: {err}"))
    }
}

/// Pull the human-readable message out of an API error body.
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    format!("{status}: {message}")
}

#[async_trait]
impl Generator for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let timeout = self.config.request_timeout;
        let builder = self.messages_request(request, false).timeout(timeout);
        let response = send(builder, timeout).await?;

        let body: MessagesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(timeout)
            } else {
                GenerationError::Malformed(format!("invalid Messages response: {e}"))
            }
        })?;

        debug!(
            model = %self.config.model,
            stop_reason = body.stop_reason.as_deref().unwrap_or(""),
            "completion finished"
        );

        Ok(body
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect())
    }

    fn stream(&self, request: GenerationRequest) -> ChunkStream {
        let builder = self.messages_request(&request, true);
        let request_timeout = self.config.request_timeout;
        let idle_timeout = self.config.idle_timeout;

        // 1. Send the request, bounding the wait for response headers.
        // 2. Decode SSE frames from the body, bounding the gap between reads.
        // 3. Yield each text delta; stop at `message_stop` or the first error.
        let stream = async_stream::stream! {
            let headers = tokio::time::timeout(request_timeout, send(builder, request_timeout));
            let response = match headers.await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    yield Err(e);
                    return;
                }
                Err(_) => {
                    yield Err(GenerationError::Timeout(request_timeout));
                    return;
                }
            };

            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            loop {
                let next = match tokio::time::timeout(idle_timeout, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(?idle_timeout, "event stream went idle");
                        yield Err(GenerationError::Timeout(idle_timeout));
                        return;
                    }
                };

                let bytes = match next {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        yield Err(transport_error(&e, idle_timeout));
                        return;
                    }
                    None => {
                        yield Err(GenerationError::Service(
                            "event stream ended before message_stop".to_string(),
                        ));
                        return;
                    }
                };

                for data in decoder.push(&bytes) {
                    match parse_stream_event(&data) {
                        Ok(StreamEvent::TextDelta(text)) => yield Ok(text),
                        Ok(StreamEvent::Stop) => return,
                        Ok(StreamEvent::Ignored) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };

        Box::pin(stream)
    }
}

// ---------------------------------------------------------------------------
// Server-sent event decoding
// ---------------------------------------------------------------------------

/// Incremental decoder for a `text/event-stream` body.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence, so
/// only complete lines are decoded.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes and return the `data` payload of every event completed by
    /// them.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // `event:`, `id:`, `retry:` and `:` comments carry nothing we need;
            // the JSON payload repeats the event type.
        }

        events
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    TextDelta(String),
    Stop,
    Ignored,
}

/// Interpret one SSE `data` payload from the Messages streaming API.
fn parse_stream_event(data: &str) -> Result<StreamEvent, GenerationError> {
    let v: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| GenerationError::Malformed(format!("invalid event JSON: {e}")))?;

    let event_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");

    match event_type {
        "content_block_delta" => {
            let delta = v.get("delta");
            let delta_type = delta
                .and_then(|d| d.get("type"))
                .and_then(|t| t.as_str())
                .unwrap_or("");
            match (delta_type, delta.and_then(|d| d.get("text")).and_then(|t| t.as_str())) {
                ("text_delta", Some(text)) => Ok(StreamEvent::TextDelta(text.to_string())),
                _ => Ok(StreamEvent::Ignored),
            }
        }
        "message_stop" => Ok(StreamEvent::Stop),
        "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown streaming error");
            Err(GenerationError::Service(message.to_string()))
        }
        other => {
            debug!(event_type = other, "ignoring stream event");
            Ok(StreamEvent::Ignored)
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
