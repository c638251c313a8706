//! Grounded answer composition.
//!
//! The [`AnswerComposer`] packs retrieved chunks into a bounded context
//! block, renders the prompt template and issues exactly one completion
//! request. Without usable context it answers with
//! [`INSUFFICIENT_INFORMATION`] and never calls the model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::{QueryAnswer, SearchResult};
use crate::error::{RagError, Result};
use crate::generation::Generator;

/// Answer returned when no context is available.
pub const INSUFFICIENT_INFORMATION: &str =
    "I do not have enough information in the loaded documents to answer this question.";

/// Placeholder replaced by the context block.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Placeholder replaced by the user's question.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Default grounded-answer prompt.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Use the following context to answer the question. \
Use only the information in the context. If the context is not sufficient, say that you do not \
have enough information.

Context:
{context}

Question: {question}

Answer:";

/// Delimiter placed between chunks in the context block.
pub const DEFAULT_CHUNK_DELIMITER: &str = "\n\n---\n\n";

/// Composer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposerConfig {
    /// Maximum context length in characters, delimiters included.
    pub max_context_chars: usize,
    /// Text inserted between consecutive chunks.
    pub chunk_delimiter: String,
    /// Prompt with `{context}` and `{question}` placeholders.
    pub prompt_template: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 12_000,
            chunk_delimiter: DEFAULT_CHUNK_DELIMITER.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Builds grounded prompts and asks a [`Generator`] to answer them.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{AnswerComposer, ComposerConfig};
///
/// let composer = AnswerComposer::new(generator, ComposerConfig::default())?;
/// let answer = composer.answer("What is MMR?", &results).await?;
/// println!("{} ({} chunks)", answer.answer, answer.chunk_count);
/// ```
pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
    config: ComposerConfig,
}

impl AnswerComposer {
    /// Create a composer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the template lacks a placeholder
    /// or `max_context_chars` is zero.
    pub fn new(generator: Arc<dyn Generator>, config: ComposerConfig) -> Result<Self> {
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !config.prompt_template.contains(placeholder) {
                return Err(RagError::ConfigError(format!(
                    "prompt_template must contain the {placeholder} placeholder"
                )));
            }
        }
        if config.max_context_chars == 0 {
            return Err(RagError::ConfigError(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        Ok(Self { generator, config })
    }

    /// Return a reference to the composer configuration.
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Answer `query` from `retrieved` chunks, in retrieval order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] if the generator fails. The
    /// request is not retried.
    pub async fn answer(&self, query: &str, retrieved: &[SearchResult]) -> Result<QueryAnswer> {
        let chunks_used = self.select_context(retrieved);
        if chunks_used.is_empty() {
            debug!(retrieved = retrieved.len(), "no usable context, skipping generation");
            return Ok(QueryAnswer {
                answer: INSUFFICIENT_INFORMATION.to_string(),
                chunks_used,
                chunk_count: 0,
            });
        }

        let context = chunks_used.join(&self.config.chunk_delimiter);
        let prompt = self.render_prompt(&context, query);
        debug!(
            chunk_count = chunks_used.len(),
            context_chars = context.chars().count(),
            "requesting grounded completion"
        );

        let answer = self.generator.complete(&prompt).await.map_err(|e| {
            error!(error = %e, "generation failed");
            match e {
                RagError::GenerationError { .. } => e,
                other => RagError::GenerationError {
                    provider: "generator".to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        let chunk_count = chunks_used.len();
        Ok(QueryAnswer { answer, chunks_used, chunk_count })
    }

    /// Longest prefix of `retrieved` whose joined text fits the budget.
    fn select_context(&self, retrieved: &[SearchResult]) -> Vec<String> {
        let delimiter_chars = self.config.chunk_delimiter.chars().count();
        let mut used = 0;
        let mut selected = Vec::new();

        for result in retrieved {
            let separator = if selected.is_empty() { 0 } else { delimiter_chars };
            let cost = separator + result.chunk.text.chars().count();
            if used + cost > self.config.max_context_chars {
                break;
            }
            used += cost;
            selected.push(result.chunk.text.clone());
        }

        selected
    }

    /// Fill both placeholders in a single pass so that placeholder-like text
    /// inside the context or the question is left untouched.
    fn render_prompt(&self, context: &str, question: &str) -> String {
        let template = self.config.prompt_template.as_str();
        let mut prompt = String::with_capacity(template.len() + context.len() + question.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            let (before, tail) = rest.split_at(start);
            prompt.push_str(before);
            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                prompt.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                prompt.push_str(question);
                rest = after;
            } else {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
        prompt.push_str(rest);
        prompt
    }
}
