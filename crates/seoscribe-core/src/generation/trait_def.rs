//! The `Generator` trait -- the adapter interface for text-generation
//! providers.
//!
//! The trait is object-safe so the workflow can hold an
//! `Arc<dyn Generator>` and tests can substitute a scripted fake.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Errors raised at the provider boundary. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service error: {0}")]
    Service(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("generation client misconfigured: {0}")]
    Config(String),
}

/// A prompt plus generation parameters, consumed once by a [`Generator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Incremental text fragments in generation order.
///
/// The stream is finite and cannot be restarted. Dropping it before it
/// ends cancels the generation and closes the underlying transport.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Adapter interface for a text-generation service.
///
/// # Object Safety
///
/// Every method returns a concrete type or a boxed trait object, so
/// `Arc<dyn Generator>` is usable.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable provider name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Generate the full text for `request`.
    ///
    /// The default implementation concatenates [`Generator::stream`], so the
    /// two always agree for a given provider response.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut chunks = self.stream(request.clone());
        let mut text = String::new();
        while let Some(chunk) = chunks.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }

    /// Stream the text for `request` as it is produced.
    ///
    /// A provider failure is yielded as the final item.
    fn stream(&self, request: GenerationRequest) -> ChunkStream;
}

// Compile-time assertion: Generator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Generator) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits the prompt back one word at a time.
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        fn stream(&self, request: GenerationRequest) -> ChunkStream {
            let words: Vec<Result<String, GenerationError>> = request
                .prompt
                .split_inclusive(' ')
                .map(|w| Ok(w.to_string()))
                .collect();
            Box::pin(futures::stream::iter(words))
        }
    }

    /// Yields one chunk and then fails.
    struct FlakyGenerator;

    #[async_trait]
    impl Generator for FlakyGenerator {
        fn name(&self) -> &str {
            "flaky"
        }

        fn stream(&self, _request: GenerationRequest) -> ChunkStream {
            Box::pin(futures::stream::iter(vec![
                Ok("partial ".to_string()),
                Err(GenerationError::Service("overloaded".to_string())),
            ]))
        }
    }

    #[test]
    fn generator_is_object_safe() {
        let generator: Box<dyn Generator> = Box::new(EchoGenerator);
        assert_eq!(generator.name(), "echo");
    }

    #[tokio::test]
    async fn default_complete_concatenates_stream() {
        let generator = EchoGenerator;
        let request = GenerationRequest::new("one two three", 16);

        let streamed: Vec<String> = generator
            .stream(request.clone())
            .map(|c| c.unwrap())
            .collect()
            .await;
        let completed = generator.complete(&request).await.unwrap();

        assert_eq!(streamed.len(), 3);
        assert_eq!(streamed.concat(), completed);
        assert_eq!(completed, "one two three");
    }

    #[tokio::test]
    async fn default_complete_propagates_stream_error() {
        let err = FlakyGenerator
            .complete(&GenerationRequest::new("x", 1))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Service("overloaded".to_string()));
    }

    #[test]
    fn request_builder_sets_system() {
        let request = GenerationRequest::new("p", 10).with_system("s");
        assert_eq!(request.system.as_deref(), Some("s"));
        assert_eq!(request.max_tokens, 10);
    }
}
