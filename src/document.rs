//! Document model for a single claim-processing run.
//!
//! A run owns exactly one [`DocumentState`]. Components never mutate it
//! directly: the classifier and each extraction stage borrow it immutably and
//! return a [`StateUpdate`], which the controller applies before the next
//! step. The borrow checker therefore guarantees that no stage ever observes
//! a state another stage is still writing.
//!
//! ## Invariants
//!
//! * Pages are sorted by `page_number`; numbers are positive and unique.
//! * A page may sit in several classification buckets at once (the discharge
//!   stage consumes both `discharge_summary` and `prescription`). Overlap is
//!   kept, not normalised away, and is visible in
//!   [`Classification::classified_pages`].
//! * State only grows: the classification is set once, and a stage moves from
//!   [`StageResult::NotAttempted`] to `Absent` or `Extracted` exactly once.

use crate::error::ClaimsError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number, unique within a run.
    pub page_number: u32,
    /// Page text; empty when the page carries no extractable text.
    pub text: String,
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

// ── Tags ─────────────────────────────────────────────────────────────────

/// Document-type tag assigned to pages by the classifier.
///
/// The vocabulary is fixed; anything the collaborator invents outside of it is
/// dropped. Declaration order is the serialisation order of a
/// [`Classification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocTag {
    ClaimForms,
    ChequeOrBankDetails,
    IdentityDocument,
    InsuranceVerificationForm,
    MedicalHistoryQuestionnaire,
    #[serde(alias = "itemized_hospital_bill")]
    ItemizedBill,
    PharmacyAndOutpatientBill,
    DischargeSummary,
    Prescription,
    InvestigationReport,
    CashReceipt,
    Other,
}

impl DocTag {
    pub const ALL: [DocTag; 12] = [
        DocTag::ClaimForms,
        DocTag::ChequeOrBankDetails,
        DocTag::IdentityDocument,
        DocTag::InsuranceVerificationForm,
        DocTag::MedicalHistoryQuestionnaire,
        DocTag::ItemizedBill,
        DocTag::PharmacyAndOutpatientBill,
        DocTag::DischargeSummary,
        DocTag::Prescription,
        DocTag::InvestigationReport,
        DocTag::CashReceipt,
        DocTag::Other,
    ];

    /// Canonical wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            DocTag::ClaimForms => "claim_forms",
            DocTag::ChequeOrBankDetails => "cheque_or_bank_details",
            DocTag::IdentityDocument => "identity_document",
            DocTag::InsuranceVerificationForm => "insurance_verification_form",
            DocTag::MedicalHistoryQuestionnaire => "medical_history_questionnaire",
            DocTag::ItemizedBill => "itemized_bill",
            DocTag::PharmacyAndOutpatientBill => "pharmacy_and_outpatient_bill",
            DocTag::DischargeSummary => "discharge_summary",
            DocTag::Prescription => "prescription",
            DocTag::InvestigationReport => "investigation_report",
            DocTag::CashReceipt => "cash_receipt",
            DocTag::Other => "other",
        }
    }

    /// Parse a collaborator-supplied label, tolerating case, surrounding
    /// whitespace, spaces or hyphens instead of underscores, and the
    /// `itemized_hospital_bill` variant.
    pub fn from_label(label: &str) -> Option<DocTag> {
        let normalised: String = label
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalised.as_str() {
            "itemized_hospital_bill" | "itemised_hospital_bill" | "itemised_bill" => {
                Some(DocTag::ItemizedBill)
            }
            other => DocTag::ALL.into_iter().find(|t| t.as_str() == other),
        }
    }
}

impl fmt::Display for DocTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Classification ───────────────────────────────────────────────────────

/// Mapping from tag to the set of page numbers carrying it.
///
/// A missing key and an empty set mean the same thing; empty buckets are
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification(BTreeMap<DocTag, BTreeSet<u32>>);

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `page` to the `tag` bucket.
    pub fn insert(&mut self, tag: DocTag, page: u32) {
        self.0.entry(tag).or_default().insert(page);
    }

    /// Pages in the `tag` bucket (empty when the tag is absent).
    pub fn pages(&self, tag: DocTag) -> impl Iterator<Item = u32> + '_ {
        self.0.get(&tag).into_iter().flatten().copied()
    }

    /// Deduplicated union of the buckets for `tags`, ascending.
    pub fn union(&self, tags: &[DocTag]) -> BTreeSet<u32> {
        tags.iter().flat_map(|&t| self.pages(t)).collect()
    }

    /// Sum of bucket sizes.
    ///
    /// A page that sits in two buckets is counted twice, so this can exceed
    /// the number of pages in the document.
    pub fn classified_pages(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    /// `true` when no page carries any tag.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocTag, &BTreeSet<u32>)> {
        self.0.iter().map(|(t, p)| (*t, p))
    }
}

impl FromIterator<(DocTag, u32)> for Classification {
    fn from_iter<I: IntoIterator<Item = (DocTag, u32)>>(iter: I) -> Self {
        let mut c = Classification::new();
        for (tag, page) in iter {
            c.insert(tag, page);
        }
        c
    }
}

// ── Stages ───────────────────────────────────────────────────────────────

/// The three extraction stages, in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Identity,
    DischargeSummary,
    ItemizedBill,
}

impl StageName {
    /// Execution order: identity → discharge → bill.
    pub const ORDER: [StageName; 3] = [
        StageName::Identity,
        StageName::DischargeSummary,
        StageName::ItemizedBill,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Identity => "identity",
            StageName::DischargeSummary => "discharge_summary",
            StageName::ItemizedBill => "itemized_bill",
        }
    }

    /// Classification tags whose pages this stage consumes.
    pub fn consumed_tags(self) -> &'static [DocTag] {
        match self {
            StageName::Identity => &[
                DocTag::IdentityDocument,
                DocTag::InsuranceVerificationForm,
                DocTag::ClaimForms,
            ],
            StageName::DischargeSummary => &[DocTag::DischargeSummary, DocTag::Prescription],
            StageName::ItemizedBill => &[DocTag::ItemizedBill],
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome slot of one extraction stage.
///
/// `Absent` covers both "no assigned pages" and "stage failed"; it is
/// deliberately distinct from `NotAttempted` so the router can tell a stage
/// has already been resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StageResult {
    #[default]
    NotAttempted,
    Absent,
    Extracted(Map<String, Value>),
}

impl StageResult {
    pub fn is_attempted(&self) -> bool {
        !matches!(self, StageResult::NotAttempted)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, StageResult::Extracted(_))
    }

    /// The extracted record, if any.
    pub fn record(&self) -> Option<&Map<String, Value>> {
        match self {
            StageResult::Extracted(m) => Some(m),
            _ => None,
        }
    }
}

// ── State ────────────────────────────────────────────────────────────────

/// A partial update returned by a pipeline component.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Classified(Classification),
    Stage {
        stage: StageName,
        result: StageResult,
    },
}

/// The single mutable aggregate of one run.
#[derive(Debug, Clone)]
pub struct DocumentState {
    pages: Vec<Page>,
    classification: Classification,
    classified: bool,
    extracted: BTreeMap<StageName, StageResult>,
}

impl DocumentState {
    /// Create the state for a run, sorting pages by number.
    ///
    /// Fails when a page number is zero or appears more than once.
    pub fn new(mut pages: Vec<Page>) -> Result<Self, ClaimsError> {
        pages.sort_by_key(|p| p.page_number);

        if let Some(p) = pages.iter().find(|p| p.page_number == 0) {
            return Err(ClaimsError::InvalidPages(format!(
                "page numbers are 1-based, got {}",
                p.page_number
            )));
        }
        if let Some(w) = pages.windows(2).find(|w| w[0].page_number == w[1].page_number) {
            return Err(ClaimsError::InvalidPages(format!(
                "page {} appears more than once",
                w[0].page_number
            )));
        }

        Ok(Self {
            pages,
            classification: Classification::new(),
            classified: false,
            extracted: StageName::ORDER
                .into_iter()
                .map(|s| (s, StageResult::NotAttempted))
                .collect(),
        })
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn is_classified(&self) -> bool {
        self.classified
    }

    pub fn result(&self, stage: StageName) -> &StageResult {
        const NOT_ATTEMPTED: &StageResult = &StageResult::NotAttempted;
        self.extracted.get(&stage).unwrap_or(NOT_ATTEMPTED)
    }

    /// Page numbers assigned to `stage` (union of its consumed buckets).
    pub fn assigned_pages(&self, stage: StageName) -> BTreeSet<u32> {
        self.classification.union(stage.consumed_tags())
    }

    /// Pages whose number is in `numbers`, ascending.
    pub fn select_pages(&self, numbers: &BTreeSet<u32>) -> Vec<&Page> {
        self.pages
            .iter()
            .filter(|p| numbers.contains(&p.page_number))
            .collect()
    }

    /// Apply an update. Updates only ever add information: classifying twice
    /// or resolving a stage twice is rejected.
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), ClaimsError> {
        match update {
            StateUpdate::Classified(classification) => {
                if self.classified {
                    return Err(ClaimsError::StateConflict(
                        "classification is already set".into(),
                    ));
                }
                self.classification = classification;
                self.classified = true;
            }
            StateUpdate::Stage { stage, result } => {
                if !result.is_attempted() {
                    return Err(ClaimsError::StateConflict(format!(
                        "stage '{stage}' cannot be reset to not-attempted"
                    )));
                }
                let slot = self.extracted.entry(stage).or_default();
                if slot.is_attempted() {
                    return Err(ClaimsError::StateConflict(format!(
                        "stage '{stage}' is already resolved"
                    )));
                }
                *slot = result;
            }
        }
        Ok(())
    }
}
