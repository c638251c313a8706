//! Cosine similarity over L2-normalized vectors.
//!
//! Every similarity in the crate goes through these helpers so the index and
//! the MMR retriever agree on the metric. A zero vector normalizes to zero
//! and therefore has similarity 0 with everything.

/// Return an L2-normalized copy of `v`.
///
/// Returns a zero vector of the same length if `v` has zero (or non-finite)
/// magnitude.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / norm).collect()
}

/// Dot product of two vectors of equal length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    dot(&normalize(a), &normalize(b))
}
