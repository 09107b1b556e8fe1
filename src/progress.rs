//! Progress-callback trait for per-run pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe a
//! run as it moves through classification and the extraction stages. The
//! trait is `Send + Sync` because batch runs process several documents
//! concurrently and share one callback.
//!
//! # Example
//!
//! ```rust
//! use edgequake_claims::{PipelineConfig, PipelineProgressCallback, StageName};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl PipelineProgressCallback for StageLogger {
//!     fn on_stage_complete(&self, stage: StageName, present: bool) {
//!         eprintln!("{stage}: {}", if present { "extracted" } else { "absent" });
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(StageLogger))
//!     .build()
//!     .unwrap();
//! ```

use crate::document::StageName;
use std::sync::Arc;

/// Called by the controller as it drives a run.
///
/// All methods default to no-ops so callers only override what they need.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once the pages are known, before classification.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after the classifier update has been applied.
    ///
    /// `classified_pages` double-counts pages carrying several tags.
    fn on_classified(&self, classified_pages: usize) {
        let _ = classified_pages;
    }

    /// Called just before a stage's collaborator call.
    fn on_stage_start(&self, stage: StageName) {
        let _ = stage;
    }

    /// Called when the router skips a stage that has no assigned pages.
    fn on_stage_skipped(&self, stage: StageName) {
        let _ = stage;
    }

    /// Called when a stage that ran has been resolved.
    fn on_stage_complete(&self, stage: StageName, present: bool) {
        let _ = (stage, present);
    }

    /// Called after aggregation.
    fn on_run_complete(&self, agents_executed: &[String]) {
        let _ = agents_executed;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
