use crate::embeddings::Embedding;
use std::cmp::Ordering;
use thiserror::Error;

/// Default number of chunks handed to the language model
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("Document index is empty")]
    EmptyIndex,
    #[error("Embedding dimension mismatch at chunk {index}: expected {expected}, found {found}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Chunk index {index} out of range for {len} chunks")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Cosine similarity of two equal-length vectors. A zero vector scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank chunks against a question and return the indices of the best `k`.
///
/// Ordering is by descending cosine similarity, ties going to the lower index.
/// Every chunk vector must have the question's dimensionality.
pub fn top_k(
    chunk_embeddings: &[Embedding],
    question: &Embedding,
    k: usize,
) -> Result<Vec<usize>, RetrievalError> {
    if chunk_embeddings.is_empty() {
        return Err(RetrievalError::EmptyIndex);
    }

    let expected = question.dimension();
    let mut scored = Vec::with_capacity(chunk_embeddings.len());
    for (index, chunk) in chunk_embeddings.iter().enumerate() {
        if chunk.dimension() != expected {
            return Err(RetrievalError::DimensionMismatch {
                index,
                expected,
                found: chunk.dimension(),
            });
        }
        scored.push((index, cosine_similarity(&chunk.values, &question.values)));
    }

    scored.sort_by(|(ia, sa), (ib, sb)| match sb.total_cmp(sa) {
        Ordering::Equal => ia.cmp(ib),
        other => other,
    });

    Ok(scored.into_iter().take(k).map(|(index, _)| index).collect())
}
