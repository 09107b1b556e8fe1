//! Configuration types for claim processing.
//!
//! Every knob of a run lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. One config is shared by all runs of a
//! [`crate::controller::ClaimPipeline`]; runs never mutate it.

use crate::error::ClaimsError;
use crate::progress::ProgressCallback;
use crate::prompts::{PromptSet, PromptTemplate};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for claim processing.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_claims::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4.1-mini")
///     .api_timeout_secs(30)
///     .classifier_preview_chars(800)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Classification and field extraction want the same answer for the same
    /// pages on every run.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    ///
    /// Long itemized bills produce large `items` arrays; a reply cut off
    /// mid-object cannot be decoded and the stage comes back absent.
    pub max_tokens: usize,

    /// Upper bound on each collaborator call, in seconds. Default: 60.
    ///
    /// A call that exceeds it is treated exactly like a malformed reply: the
    /// classifier returns no classification, a stage returns absent.
    pub api_timeout_secs: u64,

    /// Characters of each page shown to the classifier. Default: 500.
    ///
    /// The classifier sees every page in one prompt, so the preview bounds
    /// prompt size. Extraction stages always receive full page text.
    pub classifier_preview_chars: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Documents processed concurrently by `process_batch`. Default: 4.
    pub concurrency: usize,

    /// Prompt templates for the classifier and the three stages.
    pub prompts: PromptSet,

    /// Observer for run events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 60,
            classifier_preview_chars: 500,
            download_timeout_secs: 120,
            password: None,
            concurrency: 4,
            prompts: PromptSet::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("classifier_preview_chars", &self.classifier_preview_chars)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-call collaborator timeout.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// The model to request from a named or auto-detected provider.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn classifier_preview_chars(mut self, n: usize) -> Self {
        self.config.classifier_preview_chars = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.config.prompts = prompts;
        self
    }

    pub fn classifier_prompt(mut self, template: impl Into<String>) -> Self {
        self.config.prompts.classifier = PromptTemplate::new(template);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ClaimsError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(ClaimsError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.classifier_preview_chars == 0 {
            return Err(ClaimsError::InvalidConfig(
                "Classifier preview must be ≥ 1 character".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ClaimsError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        let missing = c.prompts.missing_placeholders();
        if !missing.is_empty() {
            return Err(ClaimsError::InvalidConfig(format!(
                "Prompt(s) without a {{pages}} placeholder: {}",
                missing.join(", ")
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.classifier_preview_chars, 500);
        assert_eq!(c.api_timeout(), Duration::from_secs(60));
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = PipelineConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn zero_values_are_rejected() {
        for builder in [
            PipelineConfig::builder().api_timeout_secs(0),
            PipelineConfig::builder().classifier_preview_chars(0),
            PipelineConfig::builder().concurrency(0),
        ] {
            assert!(matches!(builder.build(), Err(ClaimsError::InvalidConfig(_))));
        }
    }

    #[test]
    fn prompt_without_placeholder_is_rejected() {
        let err = PipelineConfig::builder()
            .classifier_prompt("classify these")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("classifier"), "got: {err}");
    }
}
