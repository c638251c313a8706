//! Configuration for the RAG pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the RAG pipeline.
///
/// The defaults mirror the values the service has always shipped with:
/// 600-character chunks overlapping by 200, split on newlines, and four
/// results retrieved with `lambda_mult = 0.8`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Separator the chunker splits on before packing.
    pub separator: String,
    /// Number of chunks to retrieve per query.
    pub top_k: usize,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 is pure diversity.
    pub lambda_mult: f32,
    /// Candidate pool size as a multiple of `top_k`.
    pub fetch_multiplier: usize,
    /// Maximum number of characters of context sent to the language model.
    pub max_context_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 200,
            separator: "\n".to_string(),
            top_k: 4,
            lambda_mult: 0.8,
            fetch_multiplier: 4,
            max_context_chars: 12_000,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load a configuration from a JSON file and validate it.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: RagConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `lambda_mult` is outside `[0, 1]`
    /// - `fetch_multiplier == 0` or `max_context_chars == 0`
    /// - `chunk_size > max_context_chars`, since no chunk could then fit the
    ///   context budget
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        validate_retrieval(self.top_k, self.lambda_mult)?;
        if self.fetch_multiplier == 0 {
            return Err(RagError::ConfigError(
                "fetch_multiplier must be greater than zero".to_string(),
            ));
        }
        if self.max_context_chars == 0 {
            return Err(RagError::ConfigError(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.chunk_size > self.max_context_chars {
            return Err(RagError::ConfigError(format!(
                "chunk_size ({}) must not exceed max_context_chars ({})",
                self.chunk_size, self.max_context_chars
            )));
        }
        Ok(())
    }
}

/// Validate chunking parameters.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Validate per-request retrieval parameters.
pub(crate) fn validate_retrieval(k: usize, lambda_mult: f32) -> Result<()> {
    if k == 0 {
        return Err(RagError::ConfigError("k must be greater than zero".to_string()));
    }
    if !(0.0..=1.0).contains(&lambda_mult) {
        return Err(RagError::ConfigError(format!(
            "lambda_mult ({lambda_mult}) must be within [0, 1]"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the separator used to split documents before packing.
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.config.separator = separator.into();
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the relevance/diversity trade-off.
    pub fn lambda_mult(mut self, lambda_mult: f32) -> Self {
        self.config.lambda_mult = lambda_mult;
        self
    }

    /// Set the candidate pool multiplier.
    pub fn fetch_multiplier(mut self, multiplier: usize) -> Self {
        self.config.fetch_multiplier = multiplier;
        self
    }

    /// Set the context budget in characters.
    pub fn max_context_chars(mut self, max: usize) -> Self {
        self.config.max_context_chars = max;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
