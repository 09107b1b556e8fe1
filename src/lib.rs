//! # edgequake-claims
//!
//! Turn a multi-document insurance-claim PDF into one structured JSON report
//! using a language model.
//!
//! ## Why this crate?
//!
//! A claim upload is a bundle: identity cards, claim forms, discharge
//! summaries, prescriptions and itemized hospital bills in arbitrary order.
//! Sending the whole bundle to one prompt wastes tokens and mixes fields
//! across documents. Instead this crate classifies pages first and gives each
//! extraction stage only the pages it is responsible for.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Text       per-page text via pdfium (spawn_blocking)
//!  ├─ 3. Classify   one LLM call assigns pages to document types
//!  ├─ 4. Route      identity → discharge summary → itemized bill,
//!  │                skipping stages with no assigned pages
//!  ├─ 5. Extract    one LLM call per stage, full text of its pages
//!  └─ 6. Aggregate  FinalReport: classification + records + status
//! ```
//!
//! A collaborator failure never fails a run: the classifier degrades to "no
//! pages classified" and a stage degrades to an absent result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_claims::{ClaimPipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let pipeline = ClaimPipeline::from_config(PipelineConfig::default()).await?;
//!     let report = pipeline.process_file("claim.pdf").await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     eprintln!("stages: {:?}", report.processing_status.agents_executed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `claims` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables the axum HTTP front door in [`server`] |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-claims = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use controller::{resolve_provider, write_json, ClaimPipeline};
pub use document::{Classification, DocTag, DocumentState, Page, StageName, StageResult, StateUpdate};
pub use error::{ClaimsError, DecodeError, StageError};
pub use output::{ClaimResponse, ExtractedInformation, FinalReport, ProcessingStatus};
pub use pipeline::decode::extract_json;
pub use pipeline::llm::{Completer, LlmCompleter};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use prompts::{PromptSet, PromptTemplate};
