//! Retrieval-augmented question answering over a single document.
//!
//! [`DocumentIndex`] is built once per document (chunk + embed) and never
//! mutated afterwards. [`RagEngine`] owns the index together with the model
//! handles and answers questions against it; it is `Sync`, so one engine can
//! be shared behind an `Arc` by any number of concurrent requests.

use crate::answer::{AnswerExtractor, GenerationError};
use crate::chunking::{split_into_chunks, ChunkConfig, TextChunk};
use crate::confidence::{ConfidenceGate, GateDecision};
use crate::context::{assemble_context, DEFAULT_SEPARATOR};
use crate::document::{Document, ExtractionError};
use crate::embeddings::{validate_batch, Embedder, Embedding, EmbeddingError};
use crate::retrieval::{top_k, RetrievalError, DEFAULT_TOP_K};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Texts sent to the embedding backend per request while indexing
pub const EMBED_BATCH_SIZE: usize = 32;
/// Questions answered at the same time in batch mode
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Index was built with embedding model {indexed}, but queries use {query}")]
    EmbeddingModelMismatch { indexed: String, query: String },
    #[error("Question is empty")]
    EmptyQuestion,
}

impl PipelineError {
    /// Whether the failure comes from the index or configuration rather
    /// than from a single question's round-trip to the model backend
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Retrieval(_)
                | PipelineError::EmbeddingModelMismatch { .. }
                | PipelineError::Extraction(_)
        )
    }
}

/// A question together with the answer returned for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResult {
    pub question: String,
    pub answer: String,
}

/// Answer text used when a question could not be answered
pub fn degraded_answer(cause: &PipelineError) -> String {
    format!(
        "The answer to question could not be retrieved at the moment due to {}",
        cause
    )
}

/// Chunks of one document and their embeddings, in document order
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    document_id: String,
    chunks: Vec<TextChunk>,
    embeddings: Vec<Embedding>,
    embedding_model: String,
}

impl DocumentIndex {
    /// Chunk and embed a document.
    ///
    /// A document without text cannot answer anything, so it is rejected with
    /// [`ExtractionError::EmptyDocument`] before any embedding call is made.
    pub async fn build(
        document: &Document,
        chunk_config: &ChunkConfig,
        embedder: &dyn Embedder,
    ) -> Result<Self, PipelineError> {
        let chunks = if document.is_empty() {
            Vec::new()
        } else {
            split_into_chunks(&document.content, &document.document_id, chunk_config)
        };
        if chunks.is_empty() {
            return Err(ExtractionError::EmptyDocument(document.document_id.clone()).into());
        }
        let token_estimate: usize = chunks.iter().map(|chunk| chunk.token_count).sum();
        info!(
            "Split {} into {} chunks (size {}, overlap {}), ~{} tokens",
            document.document_id,
            chunks.len(),
            chunk_config.size(),
            chunk_config.overlap(),
            token_estimate
        );

        info!("Generating embeddings with {}...", embedder.model_id());
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let batch_embeddings = embedder.embed(&texts).await?;
            validate_batch(&batch_embeddings, texts.len())?;
            embeddings.extend(batch_embeddings);
        }
        // batches are validated one at a time; check the whole index agrees
        validate_batch(&embeddings, chunks.len())?;

        info!(
            "Indexed {} chunks of dimension {}",
            embeddings.len(),
            embeddings[0].dimension()
        );

        Ok(DocumentIndex {
            document_id: document.document_id.clone(),
            chunks,
            embeddings,
            embedding_model: embedder.model_id().to_string(),
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Tunables of the per-question pipeline
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub top_k: usize,
    pub separator: String,
    pub max_concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            top_k: DEFAULT_TOP_K,
            separator: DEFAULT_SEPARATOR.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine {
    index: DocumentIndex,
    embedder: Arc<dyn Embedder>,
    extractor: AnswerExtractor,
    gate: ConfidenceGate,
    options: EngineOptions,
}

impl RagEngine {
    /// Create a new RAG engine over a built index.
    ///
    /// Questions must be embedded by the model that embedded the chunks, so
    /// the embedder is checked against the model recorded in the index.
    pub fn new(
        index: DocumentIndex,
        embedder: Arc<dyn Embedder>,
        extractor: AnswerExtractor,
        gate: ConfidenceGate,
        options: EngineOptions,
    ) -> Result<Self, PipelineError> {
        if index.is_empty() {
            return Err(RetrievalError::EmptyIndex.into());
        }
        if index.embedding_model() != embedder.model_id() {
            return Err(PipelineError::EmbeddingModelMismatch {
                indexed: index.embedding_model().to_string(),
                query: embedder.model_id().to_string(),
            });
        }

        info!(
            "RAG engine ready: document {}, {} chunks, top_k {}, llm {}",
            index.document_id(),
            index.len(),
            options.top_k,
            extractor.model_id()
        );

        Ok(RagEngine {
            index,
            embedder,
            extractor,
            gate,
            options,
        })
    }

    /// Extract, index, and wrap a document in an engine in one step
    pub async fn from_file<P: AsRef<Path>>(
        path: P,
        chunk_config: &ChunkConfig,
        embedder: Arc<dyn Embedder>,
        extractor: AnswerExtractor,
        gate: ConfidenceGate,
        options: EngineOptions,
    ) -> Result<Self, PipelineError> {
        let document = Document::from_file(path)?;
        info!("Document type: {}", document.mime_type);
        let index = DocumentIndex::build(&document, chunk_config, embedder.as_ref()).await?;
        RagEngine::new(index, embedder, extractor, gate, options)
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// Indices of the chunks most relevant to `question`, best first
    pub async fn retrieve(&self, question: &str) -> Result<Vec<usize>, PipelineError> {
        let question_embedding = self.embedder.embed_one(question).await?;
        let ranked = top_k(
            self.index.embeddings(),
            &question_embedding,
            self.options.top_k,
        )?;
        Ok(ranked)
    }

    /// Answer one question, reporting failures through the error channel
    pub async fn answer(&self, question: &str) -> Result<QaResult, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let ranked = self.retrieve(question).await?;
        debug!("Retrieved chunks {:?} for {:?}", ranked, question);

        let context = assemble_context(self.index.chunks(), &ranked, &self.options.separator)?;
        let completion = self.extractor.extract(question, &context).await?;

        let (answer, decision) = self.gate.apply(&completion);
        if let GateDecision::Rejected(reason) = decision {
            warn!("Answer to {:?} rejected: {}", question, reason);
        }

        Ok(QaResult {
            question: question.to_string(),
            answer,
        })
    }

    /// Answer one question, folding failures into the answer text
    pub async fn ask(&self, question: &str) -> QaResult {
        match self.answer(question).await {
            Ok(result) => result,
            Err(e) => {
                if e.is_configuration_error() {
                    error!("Question {:?} failed on the index: {}", question, e);
                } else {
                    error!("Question {:?} failed: {}", question, e);
                }
                QaResult {
                    question: question.trim().to_string(),
                    answer: degraded_answer(&e),
                }
            }
        }
    }

    /// Answer many questions concurrently; results keep the input order
    pub async fn answer_batch(&self, questions: &[String]) -> Vec<QaResult> {
        stream::iter(questions.iter().map(|question| self.ask(question)))
            .buffered(self.options.max_concurrency.max(1))
            .collect()
            .await
    }
}

/// Batch mode: index the document at `path` once, then answer every question
pub async fn run_batch<P: AsRef<Path>>(
    path: P,
    questions: &[String],
    chunk_config: &ChunkConfig,
    embedder: Arc<dyn Embedder>,
    extractor: AnswerExtractor,
    gate: ConfidenceGate,
    options: EngineOptions,
) -> Result<Vec<QaResult>, PipelineError> {
    let engine =
        RagEngine::from_file(path, chunk_config, embedder, extractor, gate, options).await?;
    info!("Answering {} questions", questions.len());
    Ok(engine.answer_batch(questions).await)
}
