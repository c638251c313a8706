//! Embedding capability for turning text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. The same text must map to vectors that point the same way
/// across calls so that similarity comparisons stay meaningful.
///
/// The default [`embed_batch`](Embedder::embed_batch) implementation calls
/// [`embed`](Embedder::embed) sequentially; backends that support native
/// batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::Embedder;
///
/// let embedder = MyEmbedder::new();
/// let embedding = embedder.embed("hello world").await?;
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, one per input
    /// and in the same order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}
