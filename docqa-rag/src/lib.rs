//! Retrieval-augmented question answering over loaded documents.
//!
//! This crate provides:
//! - Separator-based chunking with character-level size and overlap bounds
//! - An append-only in-memory vector index with cosine similarity and JSON
//!   snapshots
//! - Maximal Marginal Relevance retrieval
//! - Grounded answer composition over a pluggable language model
//! - A [`RagPipeline`] composing the above behind `ingest` and `query`
//!
//! Embedding and generation are abstracted behind the [`Embedder`] and
//! [`Generator`] traits. OpenAI-backed implementations are available with the
//! `openai` feature.

pub mod chunking;
pub mod composer;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod mmr;
pub mod pipeline;
pub mod similarity;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::TextSplitter;
pub use composer::{AnswerComposer, ComposerConfig, INSUFFICIENT_INFORMATION};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, ChunkMetadata, IndexStatus, NewChunk, QueryAnswer, SearchResult};
pub use embedding::Embedder;
pub use error::{RagError, Result};
pub use generation::Generator;
pub use index::VectorIndex;
pub use mmr::{MmrConfig, MmrRetriever, max_marginal_relevance};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use similarity::cosine_similarity;

#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbedder, OpenAIGenerator};
