use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Request(String),
    #[error("Embedding API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Malformed embedding response: {0}")]
    Malformed(String),
}

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding { values }
    }
}

/// Maps text into a vector space.
///
/// Chunks and questions must be embedded by the same model for their vectors
/// to be comparable; `model_id` is what the index records to check that.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one embedding per input in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Identifier of the underlying embedding model
    fn model_id(&self) -> &str;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut embeddings = self.embed(&[text.to_string()]).await?;
        match embeddings.len() {
            1 => Ok(embeddings.remove(0)),
            n => Err(EmbeddingError::Malformed(format!(
                "expected 1 embedding, got {}",
                n
            ))),
        }
    }
}

/// Check that a backend answered with one non-empty vector per input, all of one size
pub fn validate_batch(embeddings: &[Embedding], expected: usize) -> Result<(), EmbeddingError> {
    if embeddings.len() != expected {
        return Err(EmbeddingError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            embeddings.len()
        )));
    }

    let Some(first) = embeddings.first() else {
        return Ok(());
    };
    let dimension = first.dimension();
    if dimension == 0 {
        return Err(EmbeddingError::Malformed("empty embedding vector".into()));
    }
    if let Some(pos) = embeddings.iter().position(|e| e.dimension() != dimension) {
        return Err(EmbeddingError::Malformed(format!(
            "embedding {} has dimension {}, expected {}",
            pos,
            embeddings[pos].dimension(),
            dimension
        )));
    }
    Ok(())
}
