//! Language-model capability for single-shot completions.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that completes a fully assembled prompt.
///
/// Failures (timeouts, rate limits, malformed responses) are reported as
/// [`RagError::GenerationError`](crate::RagError::GenerationError). Callers
/// own the retry policy; nothing in this crate retries a completion.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Return the model's textual response to `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
