use std::sync::Arc;
use tracing::{debug, info};

use super::llm::{CompletionOptions, CompletionService};
use super::prompt::{answer_prompt, reasoning_prompt};
use super::sanitizer::{sanitize, AnswerMode, SanitizedAnswer};
use crate::config::Config;
use crate::error::AppResult;

pub const NO_ANSWER: &str = "No answer provided";

#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub question: String,
    pub document_text: String,
    pub want_reasoning: bool,
}

/// Turns a question about a document into a cleaned model answer.
pub struct AnswerService {
    completions: Arc<dyn CompletionService>,
    reasoning_model: String,
    answer_model: String,
    options: CompletionOptions,
    max_context_chars: usize,
}

impl AnswerService {
    pub fn new(completions: Arc<dyn CompletionService>, config: &Config) -> Self {
        Self {
            completions,
            reasoning_model: config.llm.reasoning_model.clone(),
            answer_model: config.llm.answer_model.clone(),
            options: CompletionOptions {
                temperature: config.llm.temperature,
                top_p: config.llm.top_p,
            },
            max_context_chars: config.max_context_chars,
        }
    }

    pub async fn answer(&self, request: AnswerRequest) -> AppResult<SanitizedAnswer> {
        let (model, prompt, mode) = if request.want_reasoning {
            (
                &self.reasoning_model,
                reasoning_prompt(&request.question, &request.document_text, self.max_context_chars),
                AnswerMode::Reasoning,
            )
        } else {
            (
                &self.answer_model,
                answer_prompt(&request.question, &request.document_text, self.max_context_chars),
                AnswerMode::Plain,
            )
        };

        debug!(
            model = %model,
            content_length = request.document_text.chars().count(),
            prompt_length = prompt.len(),
            "Built prompt"
        );

        let completion = self.completions.complete(&prompt, model, &self.options).await?;
        let mut sanitized = sanitize(&completion.text, mode);
        if sanitized.answer.is_empty() {
            sanitized.answer = NO_ANSWER.to_string();
        }

        info!(
            model = %completion.model,
            answer_length = sanitized.answer.len(),
            has_reasoning = sanitized.reasoning.is_some(),
            "Answer generated"
        );

        Ok(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, LlmError};
    use crate::services::llm::Completion;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a canned completion and records each call.
    struct CannedCompletions {
        reply: Result<String, u16>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl CannedCompletions {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for CannedCompletions {
        async fn complete(
            &self,
            prompt: &str,
            model: &str,
            _options: &CompletionOptions,
        ) -> Result<Completion, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), model.to_string()));
            match &self.reply {
                Ok(text) => Ok(Completion {
                    text: text.clone(),
                    model: model.to_string(),
                }),
                Err(status) => Err(LlmError::Api {
                    status: *status,
                    message: "rate limited".to_string(),
                }),
            }
        }
    }

    fn request(want_reasoning: bool) -> AnswerRequest {
        AnswerRequest {
            question: "What grew?".to_string(),
            document_text: "Revenue grew 5% in Q3.".to_string(),
            want_reasoning,
        }
    }

    #[tokio::test]
    async fn test_reasoning_uses_reasoning_model() {
        let stub = Arc::new(CannedCompletions::replying(
            "<think>The text says revenue.</think>The answer is **revenue**.",
        ));
        let service = AnswerService::new(stub.clone(), &Config::default());

        let answer = service.answer(request(true)).await.unwrap();
        assert_eq!(answer.answer, "revenue.");
        assert_eq!(answer.reasoning.as_deref(), Some("The text says revenue."));

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls[0].1, "deepseek-r1-distill-llama-70b");
        assert!(calls[0].0.contains("step by step"));
    }

    #[tokio::test]
    async fn test_plain_uses_answer_model() {
        let stub = Arc::new(CannedCompletions::replying("According to the document, revenue."));
        let service = AnswerService::new(stub.clone(), &Config::default());

        let answer = service.answer(request(false)).await.unwrap();
        assert_eq!(answer.answer, "revenue.");
        assert_eq!(answer.reasoning, None);
        assert_eq!(stub.calls.lock().unwrap()[0].1, "llama-3.1-70b-versatile");
    }

    #[tokio::test]
    async fn test_empty_answer_placeholder() {
        let stub = Arc::new(CannedCompletions::replying("<think>hmm</think>"));
        let service = AnswerService::new(stub, &Config::default());

        let answer = service.answer(request(true)).await.unwrap();
        assert_eq!(answer.answer, NO_ANSWER);
        assert_eq!(answer.reasoning.as_deref(), Some("hmm"));
    }

    #[tokio::test]
    async fn test_content_is_truncated() {
        let stub = Arc::new(CannedCompletions::replying("ok"));
        let config = Config {
            max_context_chars: 7,
            ..Config::default()
        };
        let service = AnswerService::new(stub.clone(), &config);

        service.answer(request(false)).await.unwrap();
        let calls = stub.calls.lock().unwrap();
        assert!(calls[0].0.ends_with("Document content: Revenue"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let service = AnswerService::new(Arc::new(CannedCompletions::failing(429)), &Config::default());

        let err = service.answer(request(false)).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::Api { status: 429, .. })));
    }
}
