use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use thiserror::Error;

/// Default bound on a single language-model call
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
/// Context longer than this is cut before it goes into the prompt
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

pub const SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks over a single document. \
Use only the retrieved context below to answer the question. \
If the context does not contain the answer, say that the context is insufficient to answer; do not guess or use outside knowledge. \
Keep the answer concise, at most three sentences.";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Language model request failed: {0}")]
    Request(String),
    #[error("Language model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("No response generated")]
    EmptyResponse,
    #[error("Language model call timed out after {0:?}")]
    Timeout(Duration),
}

/// Raw output of a language model call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Model-reported confidence in [0, 1], when the backend exposes one
    pub confidence: Option<f32>,
}

impl Completion {
    pub fn from_text(text: impl Into<String>) -> Self {
        Completion {
            text: text.into(),
            confidence: None,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, GenerationError>;

    fn model_id(&self) -> &str;
}

/// Turns a question and its retrieved context into a model answer
pub struct AnswerExtractor {
    model: Box<dyn LanguageModel>,
    timeout: Duration,
    max_context_chars: usize,
}

impl AnswerExtractor {
    pub fn new(model: Box<dyn LanguageModel>) -> Self {
        AnswerExtractor {
            model,
            timeout: DEFAULT_GENERATION_TIMEOUT,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Ask the model to answer `question` from `context` alone
    pub async fn extract(&self, question: &str, context: &str) -> Result<Completion, GenerationError> {
        let prompt = build_prompt(question, context, self.max_context_chars);
        debug!("Prompt is {} chars", prompt.len());

        match tokio::time::timeout(self.timeout, self.model.complete(SYSTEM_PROMPT, &prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        }
    }
}

/// Build the user turn of the prompt
pub fn build_prompt(question: &str, context: &str, max_context_chars: usize) -> String {
    let context = match context.char_indices().nth(max_context_chars) {
        Some((cut, _)) => &context[..cut],
        None => context,
    };
    format!("Context: {}\n\nQuestion: {}", context, question.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingModel {
        reply: String,
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, system: &str, user: &str) -> Result<Completion, GenerationError> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(Completion::from_text(self.reply.clone()))
        }

        fn model_id(&self) -> &str {
            "recording"
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<Completion, GenerationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Completion::from_text("too late"))
        }

        fn model_id(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("  What is the title? ", "The Title", 100);
        assert_eq!(prompt, "Context: The Title\n\nQuestion: What is the title?");
    }

    #[test]
    fn test_build_prompt_truncates_context() {
        let prompt = build_prompt("q", "ééééé", 2);
        assert_eq!(prompt, "Context: éé\n\nQuestion: q");
    }

    #[tokio::test]
    async fn test_extract_sends_system_prompt_and_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = RecordingModel {
            reply: "Annual Report".to_string(),
            seen: seen.clone(),
        };
        let extractor = AnswerExtractor::new(Box::new(model));
        let completion = extractor
            .extract("What is the title?", "Annual Report 2023")
            .await
            .unwrap();
        assert_eq!(completion.text, "Annual Report");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, SYSTEM_PROMPT);
        assert!(seen[0].1.contains("Annual Report 2023"));
        assert!(seen[0].1.ends_with("Question: What is the title?"));
    }

    #[tokio::test]
    async fn test_extract_times_out() {
        let extractor =
            AnswerExtractor::new(Box::new(SlowModel)).with_timeout(Duration::from_millis(50));
        let err = extractor.extract("q", "c").await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }
}
