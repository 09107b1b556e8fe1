//! The language-understanding collaborator.
//!
//! Every model call in the pipeline goes through the narrow [`Completer`]
//! seam: one prompt in, one untrusted text reply out. [`LlmCompleter`] is the
//! production implementation over an `edgequake_llm` provider; tests swap in
//! scripted completers.
//!
//! There are no retries here. Each stage calls its collaborator exactly once
//! per run, bounded by [`complete_within`]; a timeout is reported like any
//! other collaborator failure and absorbed by the caller.

use crate::config::PipelineConfig;
use crate::error::StageError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// `complete(prompt) -> reply`. Replies may be wrapped in markdown fences,
/// surrounded by prose, or not JSON at all.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, StageError>;
}

/// [`Completer`] backed by an `edgequake_llm` chat provider.
///
/// The whole prompt is sent as a single user message.
pub struct LlmCompleter {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmCompleter {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl Completer for LlmCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, StageError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];

        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "LLM call: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(response.content)
            }
            Err(e) => Err(StageError::Collaborator {
                detail: e.to_string(),
            }),
        }
    }
}

/// Call `completer` once, giving up after `timeout`.
pub async fn complete_within(
    completer: &dyn Completer,
    prompt: &str,
    timeout: Duration,
) -> Result<String, StageError> {
    match tokio::time::timeout(timeout, completer.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("LLM call exceeded {}s, abandoning it", timeout.as_secs());
            Err(StageError::Timeout {
                secs: timeout.as_secs(),
            })
        }
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Completer for Slow {
        async fn complete(&self, _prompt: &str) -> Result<String, StageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("{}".into())
        }
    }

    struct Echo;

    #[async_trait]
    impl Completer for Echo {
        async fn complete(&self, prompt: &str) -> Result<String, StageError> {
            Ok(prompt.to_uppercase())
        }
    }

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_stage_error() {
        let err = complete_within(&Slow, "p", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Timeout { secs: 2 });
    }

    #[test]
    fn fast_completer_passes_through() {
        let reply = tokio_test::block_on(complete_within(&Echo, "abc", Duration::from_secs(5)));
        assert_eq!(reply.unwrap(), "ABC");
    }
}
