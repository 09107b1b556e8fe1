//! Aggregator: merge every stage outcome into the [`FinalReport`].
//!
//! Pure and infallible. Any stage that is still unresolved is reported like
//! an absent one (`null`, not in `agents_executed`).

use crate::document::{DocumentState, StageName, StageResult};
use crate::output::{ExtractedInformation, FinalReport, ProcessingStatus};
use serde_json::Value;

pub fn aggregate(state: &DocumentState) -> FinalReport {
    let value = |stage: StageName| state.result(stage).record().cloned().map(Value::Object);

    let agents_executed = StageName::ORDER
        .into_iter()
        .filter(|&s| state.result(s).is_present())
        .map(|s| s.as_str().to_string())
        .collect();

    FinalReport {
        document_classification: state.classification().clone(),
        extracted_information: ExtractedInformation {
            identity: value(StageName::Identity),
            discharge_summary: value(StageName::DischargeSummary),
            itemized_bill: value(StageName::ItemizedBill),
        },
        processing_status: ProcessingStatus {
            total_pages: state.pages().len(),
            classified_pages: state.classification().classified_pages(),
            agents_executed,
        },
    }
}

/// Whether every stage has been resolved.
pub fn all_resolved(state: &DocumentState) -> bool {
    StageName::ORDER
        .into_iter()
        .all(|s| !matches!(state.result(s), StageResult::NotAttempted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Classification, DocTag, Page, StateUpdate};
    use serde_json::json;

    fn resolved_state() -> DocumentState {
        let mut s = DocumentState::new((1..=3).map(|i| Page::new(i, "x")).collect()).unwrap();
        let c: Classification = [
            (DocTag::IdentityDocument, 1),
            (DocTag::ClaimForms, 1),
            (DocTag::ItemizedBill, 2),
            (DocTag::ItemizedBill, 3),
        ]
        .into_iter()
        .collect();
        s.apply(StateUpdate::Classified(c)).unwrap();
        s.apply(StateUpdate::Stage {
            stage: StageName::Identity,
            result: StageResult::Extracted(
                json!({"patient_name": "A"}).as_object().cloned().unwrap(),
            ),
        })
        .unwrap();
        s.apply(StateUpdate::Stage {
            stage: StageName::DischargeSummary,
            result: StageResult::Absent,
        })
        .unwrap();
        s.apply(StateUpdate::Stage {
            stage: StageName::ItemizedBill,
            result: StageResult::Extracted(
                json!({"items": [], "calculated_total": 0.0}).as_object().cloned().unwrap(),
            ),
        })
        .unwrap();
        s
    }

    #[test]
    fn report_merges_stage_results() {
        let s = resolved_state();
        assert!(all_resolved(&s));
        let report = aggregate(&s);
        assert_eq!(report.extracted_information.identity, Some(json!({"patient_name": "A"})));
        assert_eq!(report.extracted_information.discharge_summary, None);
        assert_eq!(report.processing_status.total_pages, 3);
        // page 1 sits in two buckets and counts twice
        assert_eq!(report.processing_status.classified_pages, 4);
        assert_eq!(
            report.processing_status.agents_executed,
            vec!["identity".to_string(), "itemized_bill".to_string()]
        );
    }

    #[test]
    fn aggregation_is_idempotent() {
        let s = resolved_state();
        let a = serde_json::to_vec(&aggregate(&s)).unwrap();
        let b = serde_json::to_vec(&aggregate(&s)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unresolved_stages_read_as_absent() {
        let s = DocumentState::new(vec![Page::new(1, "")]).unwrap();
        assert!(!all_resolved(&s));
        let report = aggregate(&s);
        assert_eq!(report.extracted_information, ExtractedInformation::default());
        assert!(report.processing_status.agents_executed.is_empty());
        assert_eq!(report.processing_status.classified_pages, 0);
    }
}
