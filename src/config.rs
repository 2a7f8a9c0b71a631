use crate::answer::DEFAULT_MAX_CONTEXT_CHARS;
use crate::chunking::{ChunkConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::rag::{EngineOptions, DEFAULT_MAX_CONCURRENCY};
use crate::retrieval::DEFAULT_TOP_K;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Pipeline settings read from the environment
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Document to index in service mode
    pub file_path: Option<PathBuf>,
    pub chunk: ChunkConfig,
    pub top_k: usize,
    pub llm_timeout: Duration,
    pub min_confidence: f32,
    /// Upper bound on the context characters sent to the language model
    pub max_context_chars: usize,
    pub max_concurrency: usize,
    pub bind_addr: String,
}

impl PipelineConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let chunk_size = parse_var("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = parse_var("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        let chunk = ChunkConfig::new(chunk_size, chunk_overlap)
            .context("Invalid CHUNK_SIZE / CHUNK_OVERLAP")?;

        Ok(PipelineConfig {
            file_path: env::var("FILE_PATH").ok().map(PathBuf::from),
            chunk,
            top_k: parse_var("TOP_K", DEFAULT_TOP_K)?,
            llm_timeout: Duration::from_secs(parse_var(
                "LLM_TIMEOUT_SECS",
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
            min_confidence: parse_var("MIN_CONFIDENCE", 0.0)?,
            max_context_chars: parse_var("MAX_CONTEXT_CHARS", DEFAULT_MAX_CONTEXT_CHARS)?,
            max_concurrency: parse_var("MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            top_k: self.top_k,
            max_concurrency: self.max_concurrency.max(1),
            ..EngineOptions::default()
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", name, value)),
        Err(_) => Ok(default),
    }
}
