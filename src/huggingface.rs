use crate::answer::{Completion, GenerationError, LanguageModel};
use crate::embeddings::{validate_batch, Embedding, EmbeddingError, Embedder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_CHAT_URL: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the Hugging Face Inference API
#[derive(Clone, Debug)]
pub struct HuggingFaceConfig {
    pub api_token: String,
    /// Base URL of the feature-extraction endpoints; the model id is appended
    pub inference_url: String,
    /// OpenAI-compatible chat completions endpoint
    pub chat_url: String,
    pub embedding_model: String,
    pub llm_model: String,
    pub max_tokens: u32,
    /// Ask the chat endpoint for token log-probabilities to derive a confidence
    pub request_logprobs: bool,
}

impl HuggingFaceConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_token = env::var("HUGGING_FACE_HUB_API_TOKEN")
            .context("HUGGING_FACE_HUB_API_TOKEN not set")?;
        let embedding_model =
            env::var("EMBEDDING_MODEL_NAME").context("EMBEDDING_MODEL_NAME not set")?;
        let llm_model = env::var("LLM_MODEL_NAME").context("LLM_MODEL_NAME not set")?;
        let inference_url =
            env::var("HF_INFERENCE_URL").unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_string());
        let chat_url = env::var("HF_CHAT_URL").unwrap_or_else(|_| DEFAULT_CHAT_URL.to_string());
        let max_tokens = match env::var("MAX_TOKENS") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("MAX_TOKENS must be a positive integer, got {}", value))?,
            Err(_) => DEFAULT_MAX_TOKENS,
        };
        let request_logprobs = env::var("LLM_LOGPROBS")
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(HuggingFaceConfig {
            api_token,
            inference_url,
            chat_url,
            embedding_model,
            llm_model,
            max_tokens,
            request_logprobs,
        })
    }
}

/// Client for the Hugging Face Inference API. One handle serves both the
/// embedding and the chat model.
#[derive(Clone)]
pub struct HuggingFaceClient {
    config: HuggingFaceConfig,
    client: reqwest::Client,
}

impl HuggingFaceClient {
    pub fn new(config: HuggingFaceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HuggingFaceClient { config, client })
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/{}/pipeline/feature-extraction",
            self.config.inference_url.trim_end_matches('/'),
            self.config.embedding_model
        )
    }

    /// Embedding handle bound to this client
    pub fn embedder(&self) -> HuggingFaceEmbedder {
        HuggingFaceEmbedder(self.clone())
    }

    /// Chat model handle bound to this client
    pub fn chat_model(&self) -> HuggingFaceChat {
        HuggingFaceChat(self.clone())
    }

    /// Generate embeddings for a batch of texts
    pub async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        #[derive(Serialize)]
        struct FeatureExtractionRequest<'a> {
            inputs: &'a [String],
        }

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.config.api_token)
            .json(&FeatureExtractionRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EmbeddingError::Api { status, body });
        }

        // Sentence-transformer models answer with one pooled vector per input
        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        let embeddings: Vec<Embedding> = vectors.into_iter().map(Embedding::from).collect();
        validate_batch(&embeddings, texts.len())?;
        debug!("Embedded {} texts", embeddings.len());

        Ok(embeddings)
    }

    /// Generate a chat completion
    pub async fn generate_text(&self, system: &str, user: &str) -> Result<Completion, GenerationError> {
        let request = ChatRequest {
            model: &self.config.llm_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
            // greedy decoding
            temperature: 0.0,
            logprobs: self.config.request_logprobs.then_some(true),
        };

        let response = self
            .client
            .post(&self.config.chat_url)
            .bearer_auth(&self.config.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Api { status, body });
        }

        let response_data: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let choice = response_data
            .choices
            .into_iter()
            .next()
            .ok_or(GenerationError::EmptyResponse)?;
        let text = choice.message.content.ok_or(GenerationError::EmptyResponse)?;
        let confidence = choice.logprobs.and_then(|lp| mean_token_probability(&lp.content));

        Ok(Completion { text, confidence })
    }
}

/// Geometric-mean token probability, `exp(mean(logprob))`
fn mean_token_probability(tokens: &[TokenLogprob]) -> Option<f32> {
    if tokens.is_empty() {
        return None;
    }
    let mean = tokens.iter().map(|t| t.logprob).sum::<f32>() / tokens.len() as f32;
    Some(mean.exp())
}

/// [`Embedder`] backed by the feature-extraction pipeline
#[derive(Clone)]
pub struct HuggingFaceEmbedder(HuggingFaceClient);

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.0.get_embeddings(texts).await
    }

    fn model_id(&self) -> &str {
        &self.0.config.embedding_model
    }
}

/// [`LanguageModel`] backed by the chat completions endpoint
#[derive(Clone)]
pub struct HuggingFaceChat(HuggingFaceClient);

#[async_trait]
impl LanguageModel for HuggingFaceChat {
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, GenerationError> {
        self.0.generate_text(system, user).await
    }

    fn model_id(&self) -> &str {
        &self.0.config.llm_model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    logprobs: Option<bool>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    logprobs: Option<ChoiceLogprobs>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChoiceLogprobs {
    #[serde(default)]
    content: Vec<TokenLogprob>,
}

#[derive(Deserialize, Debug)]
struct TokenLogprob {
    logprob: f32,
}
