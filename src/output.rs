//! Output types: the aggregated report of one run and the front-door response.

use crate::document::Classification;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The merged result of one claim-processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    /// Page numbers per document type, as classified.
    pub document_classification: Classification,
    /// Per-stage records; `null` when the stage was absent.
    pub extracted_information: ExtractedInformation,
    pub processing_status: ProcessingStatus,
}

/// One slot per extraction stage, keyed by semantic name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInformation {
    pub identity: Option<Value>,
    pub discharge_summary: Option<Value>,
    pub itemized_bill: Option<Value>,
}

/// Summary statistics of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    /// Pages in the document.
    pub total_pages: usize,
    /// Sum of bucket sizes across all tags. Pages classified under several
    /// tags are counted once per tag, so this may exceed `total_pages`.
    pub classified_pages: usize,
    /// Stages whose result is present, in execution order.
    pub agents_executed: Vec<String>,
}

/// Response body of the HTTP front door and of `claims process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub claim_id: String,
    pub status: String,
    #[serde(flatten)]
    pub report: FinalReport,
}

impl ClaimResponse {
    pub fn success(claim_id: impl Into<String>, report: FinalReport) -> Self {
        Self {
            claim_id: claim_id.into(),
            status: "success".into(),
            report,
        }
    }
}
