//! OpenAI-backed [`Embedder`] and [`Generator`] using the OpenAI HTTP API.
//!
//! This module is only available when the `openai` feature is enabled.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::Generator;

const PROVIDER: &str = "OpenAI";

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// The default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// The default sampling temperature for answers.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// The default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The default number of inputs sent per embeddings request.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// The most inputs the embeddings endpoint accepts in one request.
pub const MAX_BATCH_SIZE: usize = 2048;

fn api_key_from_env() -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| RagError::ConfigError("OPENAI_API_KEY environment variable not set".into()))
}

fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(RagError::ConfigError("OpenAI API key must not be empty".into()));
    }
    Ok(())
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// Embed `texts` in consecutive batches of at most `batch_size`, joining the
/// results in input order. The first failing batch aborts the whole call.
async fn embed_in_batches<'a, F, Fut>(
    texts: &'a [&'a str],
    batch_size: usize,
    mut request: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&'a [&'a str]) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<f32>>>>,
{
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        embeddings.extend(request(batch).await?);
    }
    Ok(embeddings)
}

/// Put one response's vectors back into input order.
fn order_by_index(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(OpenAIEmbedder::failure(format!(
            "expected {expected} embeddings, API returned {}",
            data.len()
        )));
    }
    // The API may reorder results; `index` maps them back to inputs.
    data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Turn a non-success response into a readable message, preferring the API's
/// own error text over the raw body.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// ── OpenAI API request/response types ──

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embedder ──

/// An [`Embedder`] backed by the OpenAI embeddings API.
///
/// Uses `reqwest` to call the `/embeddings` endpoint directly.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-large`.
/// - `base_url` – defaults to `https://api.openai.com/v1`.
/// - `timeout` – per-request timeout, defaults to 60 seconds.
/// - `batch_size` – inputs per request, defaults to 1000 and capped at 2048.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbedder;
///
/// let embedder = OpenAIEmbedder::from_env()?;
/// let embedding = embedder.embed("hello world").await?;
/// ```
#[derive(Clone)]
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl OpenAIEmbedder {
    /// Create a new embedder with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Create a new embedder using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the model name (e.g. `text-embedding-3-small`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the embedder at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Set how many inputs go into each request, clamped to
    /// `1..=MAX_BATCH_SIZE`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The number of inputs sent per request.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn failure(message: String) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message }
    }

    async fn request_embeddings(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest { model: &self.model, input: batch };
        let response = self
            .client
            .post(endpoint(&self.base_url, "embeddings"))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                Self::failure(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "embedding API error");
            return Err(Self::failure(message));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embedding response");
            Self::failure(format!("failed to parse response: {e}"))
        })?;
        order_by_index(embedding_response.data, batch.len())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Self::failure("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            inputs = texts.len(),
            batch_size = self.batch_size,
            model = %self.model,
            "embedding batch"
        );

        embed_in_batches(texts, self.batch_size, |batch| self.request_embeddings(batch)).await
    }
}

// ── Generator ──

/// A [`Generator`] backed by the OpenAI chat completions API.
///
/// The prompt is sent as a single user message. Failures are reported as
/// [`RagError::GenerationError`] and never retried.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIGenerator;
///
/// let generator = OpenAIGenerator::from_env()?.with_model("gpt-4o");
/// let answer = generator.complete("Say hello").await?;
/// ```
#[derive(Clone)]
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    /// Create a new generator with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Create a new generator using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn failure(message: String) -> RagError {
        RagError::GenerationError { provider: PROVIDER.into(), message }
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = prompt.len(),
            "requesting chat completion"
        );

        let request_body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };
        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "completion request failed");
                Self::failure(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "completion API error");
            return Err(Self::failure(message));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse completion response");
            Self::failure(format!("failed to parse response: {e}"))
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Self::failure("API returned no completion".into()))
    }
}
