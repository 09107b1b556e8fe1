//! Pipeline controller: drives one document through classification, the
//! extraction stages and aggregation.
//!
//! A [`ClaimPipeline`] is built once and shared; every run owns a fresh
//! [`DocumentState`], so concurrent runs never see each other's data.
//! Components only read the state and return a [`crate::document::StateUpdate`];
//! the controller is the single place that applies updates.

use crate::config::PipelineConfig;
use crate::document::{DocumentState, Page, StageName, StageResult, StateUpdate};
use crate::error::ClaimsError;
use crate::output::{ClaimResponse, FinalReport};
use crate::pipeline::aggregate::{aggregate, all_resolved};
use crate::pipeline::classify::PageClassifier;
use crate::pipeline::extract::ExtractionStage;
use crate::pipeline::llm::{Completer, LlmCompleter};
use crate::pipeline::router::{Route, StageRouter};
use crate::pipeline::{input, text};
use crate::progress::{NoopProgressCallback, PipelineProgressCallback};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The claim-processing pipeline.
///
/// # Example
/// ```rust,no_run
/// use edgequake_claims::{ClaimPipeline, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
/// let pipeline = ClaimPipeline::from_config(PipelineConfig::default()).await?;
/// let response = pipeline.process_claim("CLM-1001", "claim.pdf").await?;
/// println!("{}", serde_json::to_string_pretty(&response)?);
/// # Ok(())
/// # }
/// ```
pub struct ClaimPipeline {
    config: PipelineConfig,
    completer: Arc<dyn Completer>,
    classifier: PageClassifier,
    stages: [ExtractionStage; 3],
}

impl ClaimPipeline {
    /// Build a pipeline whose collaborator is the LLM provider resolved from
    /// `config` and the environment.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, ClaimsError> {
        let provider = resolve_provider(&config).await?;
        let completer = Arc::new(LlmCompleter::new(provider, &config));
        Ok(Self::with_completer(config, completer))
    }

    /// Build a pipeline around an arbitrary collaborator.
    pub fn with_completer(config: PipelineConfig, completer: Arc<dyn Completer>) -> Self {
        let classifier = PageClassifier::new(
            config.prompts.classifier.clone(),
            config.classifier_preview_chars,
        );
        let stages = ExtractionStage::all(&config.prompts);
        Self {
            config,
            completer,
            classifier,
            stages,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn stage(&self, name: StageName) -> &ExtractionStage {
        // `ExtractionStage::all` builds the stages in `StageName::ORDER`.
        let index = StageName::ORDER
            .iter()
            .position(|s| *s == name)
            .unwrap_or_default();
        &self.stages[index]
    }

    fn progress(&self) -> &dyn PipelineProgressCallback {
        match self.config.progress_callback {
            Some(ref cb) => cb.as_ref(),
            None => &NoopProgressCallback,
        }
    }

    /// Run the pipeline over already-extracted pages.
    ///
    /// Collaborator failures never fail the run; they surface as absent
    /// stages. Errors are limited to invalid page lists and state conflicts.
    pub async fn run(&self, pages: Vec<Page>) -> Result<FinalReport, ClaimsError> {
        let start = Instant::now();
        let mut state = DocumentState::new(pages)?;
        let progress = self.progress();
        let timeout = self.config.api_timeout();

        info!("Starting run: {} pages", state.pages().len());
        progress.on_run_start(state.pages().len());

        // ── Classification ───────────────────────────────────────────────
        let update = self
            .classifier
            .classify(&state, self.completer.as_ref(), timeout)
            .await;
        state.apply(update)?;
        progress.on_classified(state.classification().classified_pages());

        // ── Routed extraction ────────────────────────────────────────────
        let mut router = StageRouter::new();
        let report = loop {
            match router.next(&state) {
                Route::Run(name) => {
                    info!("Running stage '{}'", name);
                    progress.on_stage_start(name);
                    let update = self
                        .stage(name)
                        .run(&state, self.completer.as_ref(), timeout)
                        .await;
                    state.apply(update)?;
                    progress.on_stage_complete(name, state.result(name).is_present());
                }
                Route::Skip(name) => {
                    info!("Skipping stage '{}': no assigned pages", name);
                    state.apply(StateUpdate::Stage {
                        stage: name,
                        result: StageResult::Absent,
                    })?;
                    progress.on_stage_skipped(name);
                }
                Route::Aggregate => {
                    if !all_resolved(&state) {
                        return Err(ClaimsError::Internal(
                            "aggregation reached with unresolved stages".into(),
                        ));
                    }
                    let report = aggregate(&state);
                    router.complete();
                    break report;
                }
                Route::Finished => {
                    return Err(ClaimsError::Internal(
                        "router finished without aggregating".into(),
                    ))
                }
            }
        };

        info!(
            "Run complete: {}/3 stages present, {}ms",
            report.processing_status.agents_executed.len(),
            start.elapsed().as_millis()
        );
        progress.on_run_complete(&report.processing_status.agents_executed);
        Ok(report)
    }

    /// Process a PDF file or URL.
    pub async fn process_file(&self, input_str: impl AsRef<str>) -> Result<FinalReport, ClaimsError> {
        let input_str = input_str.as_ref();
        info!("Processing: {}", input_str);

        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        let pages = text::extract_pages(resolved.path(), self.config.password.as_deref()).await?;
        debug!("Extracted text from {} pages", pages.len());

        // A downloaded temp file is removed when `resolved` drops.
        self.run(pages).await
    }

    /// Process PDF bytes held in memory.
    ///
    /// The bytes are written to a managed temp file that is removed on every
    /// exit path.
    pub async fn process_bytes(&self, bytes: &[u8]) -> Result<FinalReport, ClaimsError> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| ClaimsError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| ClaimsError::Internal(format!("tempfile write: {e}")))?;
        let path = tmp.path().to_string_lossy().to_string();
        self.process_file(&path).await
    }

    /// Process a claim and wrap the report in the front-door response.
    pub async fn process_claim(
        &self,
        claim_id: impl Into<String>,
        input_str: impl AsRef<str>,
    ) -> Result<ClaimResponse, ClaimsError> {
        let report = self.process_file(input_str).await?;
        Ok(ClaimResponse::success(claim_id, report))
    }

    /// Process several documents concurrently, bounded by `concurrency`.
    ///
    /// Results are returned in input order. Each document fails or succeeds
    /// independently.
    pub async fn process_batch(
        &self,
        inputs: &[String],
    ) -> Vec<Result<FinalReport, ClaimsError>> {
        let mut results: Vec<(usize, Result<FinalReport, ClaimsError>)> =
            stream::iter(inputs.iter().enumerate().map(|(idx, input)| async move {
                (idx, self.process_file(input).await)
            }))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Synchronous wrapper around [`ClaimPipeline::process_file`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn process_sync(&self, input_str: impl AsRef<str>) -> Result<FinalReport, ClaimsError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ClaimsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process_file(input_str))
    }
}

/// Write a serialisable report as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_json<T: serde::Serialize>(
    value: &T,
    output_path: impl AsRef<Path>,
) -> Result<(), ClaimsError> {
    let path = output_path.as_ref();
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| ClaimsError::Internal(format!("serialise report: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ClaimsError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, body)
        .await
        .map_err(|e| ClaimsError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ClaimsError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ClaimsError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ClaimsError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured even when several API keys are present.
/// 4. **OpenAI** whenever `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub async fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ClaimsError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ClaimsError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
