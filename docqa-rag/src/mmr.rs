//! Maximal Marginal Relevance (MMR) retrieval.
//!
//! MMR re-selects an over-sized candidate pool to balance relevance and
//! diversity:
//!
//! `mmr(c) = λ × sim(query, c) − (1 − λ) × max(sim(c, s) for s in selected)`
//!
//! - λ = 1.0: pure relevance (plain top-k)
//! - λ = 0.5: balanced
//! - λ = 0.0: pure diversity after the first pick

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{RagConfig, validate_retrieval};
use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::similarity::{dot, normalize};

/// MMR retriever configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MmrConfig {
    /// Candidate pool size as a multiple of `k`.
    pub fetch_multiplier: usize,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self { fetch_multiplier: 4 }
    }
}

impl MmrConfig {
    /// Candidate pool size for a request of `k` results.
    pub fn pool_size(&self, k: usize) -> usize {
        k.saturating_mul(self.fetch_multiplier).max(k)
    }
}

impl From<&RagConfig> for MmrConfig {
    fn from(config: &RagConfig) -> Self {
        Self { fetch_multiplier: config.fetch_multiplier }
    }
}

/// Diversity-aware retriever over a shared [`VectorIndex`].
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{MmrConfig, MmrRetriever};
///
/// let retriever = MmrRetriever::new(index.clone(), MmrConfig::default());
/// let results = retriever.retrieve(&query_embedding, 4, 0.8).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MmrRetriever {
    index: Arc<VectorIndex>,
    config: MmrConfig,
}

impl MmrRetriever {
    /// Create a retriever reading from `index`.
    pub fn new(index: Arc<VectorIndex>, config: MmrConfig) -> Self {
        Self { index, config }
    }

    /// Return a reference to the retriever configuration.
    pub fn config(&self) -> &MmrConfig {
        &self.config
    }

    /// Select up to `k` chunks for `query` in MMR selection order.
    ///
    /// Each result's `score` is its cosine similarity to the query. An empty
    /// index yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `k == 0` or `lambda_mult` is
    /// outside `[0, 1]`, and [`RagError::DimensionMismatch`] if the query
    /// does not match the index dimensionality.
    pub async fn retrieve(
        &self,
        query: &[f32],
        k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<SearchResult>> {
        validate_retrieval(k, lambda_mult)?;
        if self.config.fetch_multiplier == 0 {
            return Err(RagError::ConfigError(
                "fetch_multiplier must be greater than zero".to_string(),
            ));
        }

        let pool_size = self.config.pool_size(k);
        let pool = self.index.search_by_vector(query, pool_size).await?;
        let pool_len = pool.len();
        let selected = max_marginal_relevance(query, pool, k, lambda_mult);

        debug!(k, lambda_mult, pool_size, pool_len, selected = selected.len(), "mmr retrieval");
        Ok(selected)
    }
}

/// Greedily select up to `k` candidates maximizing marginal relevance.
///
/// `candidates` is the pool in rank order. Ties on the MMR score go to the
/// candidate more similar to the query, then to the earlier-ranked one. The
/// returned results carry their similarity to the query as `score`.
pub fn max_marginal_relevance(
    query: &[f32],
    candidates: Vec<SearchResult>,
    k: usize,
    lambda_mult: f32,
) -> Vec<SearchResult> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let query = normalize(query);
    let units: Vec<Vec<f32>> = candidates.iter().map(|c| normalize(&c.chunk.embedding)).collect();
    let relevance: Vec<f32> = units.iter().map(|u| dot(&query, u)).collect();

    let k = k.min(candidates.len());
    let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    // Pool positions not yet selected, kept in rank order.
    let mut remaining: Vec<usize> = (0..slots.len()).collect();
    // Highest similarity of each candidate to anything selected so far.
    let mut redundancy = vec![0.0f32; slots.len()];
    let mut selected = Vec::with_capacity(k);

    while selected.len() < k && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (slot, &candidate) in remaining.iter().enumerate() {
            let score =
                lambda_mult * relevance[candidate] - (1.0 - lambda_mult) * redundancy[candidate];
            let better = match best {
                None => true,
                Some((best_slot, best_score)) => {
                    let incumbent = remaining[best_slot];
                    score > best_score
                        || (score == best_score && relevance[candidate] > relevance[incumbent])
                }
            };
            if better {
                best = Some((slot, score));
            }
        }

        let Some((slot, _)) = best else { break };
        let pick = remaining.remove(slot);
        for &other in &remaining {
            let similarity = dot(&units[pick], &units[other]);
            if selected.is_empty() || similarity > redundancy[other] {
                redundancy[other] = similarity;
            }
        }

        if let Some(mut result) = slots[pick].take() {
            result.score = relevance[pick];
            selected.push(result);
        }
    }

    selected
}
