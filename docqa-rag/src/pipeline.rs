//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] wires the four components together by plain
//! composition: a [`TextSplitter`] and an [`Embedder`] feed the shared
//! [`VectorIndex`] on ingestion; the [`MmrRetriever`] and the
//! [`AnswerComposer`] serve queries.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagConfig, RagPipeline, VectorIndex};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedder(Arc::new(my_embedder))
//!     .generator(Arc::new(my_generator))
//!     .index(Arc::new(VectorIndex::new()))
//!     .build()?;
//!
//! pipeline.ingest_text(&text, "history.txt").await?;
//! let answer = pipeline.query("Who discovered Brazil?", 4, 0.8).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::TextSplitter;
use crate::composer::{AnswerComposer, ComposerConfig};
use crate::config::{RagConfig, validate_retrieval};
use crate::document::{IndexStatus, NewChunk, QueryAnswer, SearchResult};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::mmr::{MmrConfig, MmrRetriever};

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → insert) and query
/// execution (embed → MMR retrieve → compose). Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    retriever: MmrRetriever,
    composer: AnswerComposer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the shared vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Ingest a document: chunk → embed → insert.
    ///
    /// Returns the number of chunks inserted. A document that produces no
    /// chunks returns 0 without calling the embedder.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] for invalid chunking parameters
    /// - [`RagError::EmbeddingError`] if embedding fails, returns the wrong
    ///   number of vectors or returns non-finite values
    /// - [`RagError::DimensionMismatch`] if the vectors do not match the index
    pub async fn ingest(
        &self,
        document_text: &str,
        chunk_size: usize,
        chunk_overlap: usize,
        separator: &str,
        source_id: &str,
    ) -> Result<usize> {
        let splitter = TextSplitter::new(chunk_size, chunk_overlap, separator)?;
        let texts: Vec<&str> = splitter.split(document_text).collect();
        if texts.is_empty() {
            info!(source_id, chunk_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
            error!(source_id, error = %e, "embedding failed during ingestion");
            into_embedding_error(e)
        })?;
        if embeddings.len() != texts.len() {
            error!(
                source_id,
                expected = texts.len(),
                actual = embeddings.len(),
                "embedder returned the wrong number of vectors"
            );
            return Err(RagError::EmbeddingError {
                provider: "embedder".to_string(),
                message: format!(
                    "expected {} embeddings for '{source_id}', got {}",
                    texts.len(),
                    embeddings.len()
                ),
            });
        }

        if let Some(position) = embeddings.iter().position(|v| !v.iter().all(|x| x.is_finite())) {
            error!(source_id, chunk_index = position, "embedder returned non-finite values");
            return Err(RagError::EmbeddingError {
                provider: "embedder".to_string(),
                message: format!(
                    "embedding for chunk {position} of '{source_id}' contains non-finite values"
                ),
            });
        }

        let chunks: Vec<NewChunk> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| NewChunk::new(text, embedding, source_id, i))
            .collect();

        let chunk_count = self.index.insert(chunks).await.map_err(|e| {
            error!(source_id, error = %e, "insert failed during ingestion");
            e
        })?;

        info!(source_id, chunk_count, "ingested document");
        Ok(chunk_count)
    }

    /// Ingest a document with the configured chunking parameters.
    pub async fn ingest_text(&self, document_text: &str, source_id: &str) -> Result<usize> {
        let config = &self.config;
        self.ingest(
            document_text,
            config.chunk_size,
            config.chunk_overlap,
            &config.separator,
            source_id,
        )
        .await
    }

    /// Read a UTF-8 text file and ingest it with the configured chunking
    /// parameters. The file name is used as the source id.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to read document");
            e
        })?;
        let source_id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest_text(&text, &source_id).await
    }

    /// Retrieve up to `k` chunks for `query_text` without generating an answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for invalid `k`/`lambda_mult` and
    /// [`RagError::EmbeddingError`] if the query cannot be embedded.
    pub async fn retrieve(
        &self,
        query_text: &str,
        k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<SearchResult>> {
        validate_retrieval(k, lambda_mult)?;
        if self.index.count().await == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query_text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            into_embedding_error(e)
        })?;

        self.retriever.retrieve(&query_embedding, k, lambda_mult).await.map_err(|e| {
            error!(error = %e, "retrieval failed");
            e
        })
    }

    /// Answer `query_text` from the `k` chunks selected by MMR.
    ///
    /// An empty index yields the insufficient-information answer without
    /// calling the embedder or the generator.
    ///
    /// # Errors
    ///
    /// See [`retrieve`](Self::retrieve); additionally returns
    /// [`RagError::GenerationError`] if the language model fails.
    pub async fn query(&self, query_text: &str, k: usize, lambda_mult: f32) -> Result<QueryAnswer> {
        let retrieved = self.retrieve(query_text, k, lambda_mult).await?;
        let answer = self.composer.answer(query_text, &retrieved).await?;
        info!(k, retrieved = retrieved.len(), chunk_count = answer.chunk_count, "query completed");
        Ok(answer)
    }

    /// Answer `query_text` with the configured `top_k` and `lambda_mult`.
    pub async fn query_default(&self, query_text: &str) -> Result<QueryAnswer> {
        self.query(query_text, self.config.top_k, self.config.lambda_mult).await
    }

    /// Summarize what the index holds.
    pub async fn status(&self) -> IndexStatus {
        self.index.status().await
    }

    /// Remove every chunk from the index.
    pub async fn clear(&self) {
        self.index.clear().await;
    }
}

fn into_embedding_error(e: RagError) -> RagError {
    match e {
        RagError::EmbeddingError { .. } => e,
        other => RagError::EmbeddingError {
            provider: "embedder".to_string(),
            message: other.to_string(),
        },
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedder` and `generator` are required; `config` defaults to
/// [`RagConfig::default()`] and `index` to a fresh empty [`VectorIndex`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .embedder(Arc::new(embedder))
///     .generator(Arc::new(generator))
///     .index(shared_index.clone())  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    index: Option<Arc<VectorIndex>>,
    prompt_template: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding capability.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the language-model capability.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Share an existing index instead of creating a new one.
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Replace the default grounded-answer prompt.
    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    /// Build the [`RagPipeline`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let index = self.index.unwrap_or_default();

        let mut composer_config =
            ComposerConfig { max_context_chars: config.max_context_chars, ..Default::default() };
        if let Some(template) = self.prompt_template {
            composer_config.prompt_template = template;
        }

        Ok(RagPipeline {
            retriever: MmrRetriever::new(index.clone(), MmrConfig::from(&config)),
            composer: AnswerComposer::new(generator, composer_config)?,
            config,
            embedder,
            index,
        })
    }
}
