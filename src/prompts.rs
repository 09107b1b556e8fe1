//! Prompt templates for the classifier and the three extraction stages.
//!
//! Each template is an immutable record injected into the component that uses
//! it (see [`PromptSet`] and [`crate::config::PipelineConfig::prompts`]);
//! there is no shared mutable prompt state. Every template must contain the
//! [`PAGES_PLACEHOLDER`], which is replaced by the page listing at call time.

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the page listing.
pub const PAGES_PLACEHOLDER: &str = "{pages}";

/// Default classifier prompt. Receives truncated page previews.
pub const CLASSIFIER_PROMPT: &str = r#"You are a medical claim document classifier.

Classify EACH page of the document into the type that best describes it.
Use ONLY these types:
- claim_forms
- cheque_or_bank_details
- identity_document
- insurance_verification_form
- medical_history_questionnaire
- itemized_bill
- pharmacy_and_outpatient_bill
- discharge_summary
- prescription
- investigation_report
- cash_receipt
- other

Respond with a single JSON object whose keys are types and whose values are
lists of page numbers. Omit types with no pages. Do NOT repeat keys.
Example:
{
  "identity_document": [1],
  "discharge_summary": [2, 3]
}

Respond with ONLY the JSON object.

Pages to classify:
{pages}"#;

/// Default identity-stage prompt.
pub const IDENTITY_PROMPT: &str = r#"You are a medical claim identity information extractor.

Extract the following from these identity, insurance verification and claim form pages:
- Patient name (full name)
- Date of birth
- ID numbers (policy number, patient ID, member ID)
- Policy details (insurer name, policy number)
- Contact information, if present

Respond with ONLY a JSON object of this shape. No explanation, no markdown.
{
  "patient_name": "John Doe",
  "date_of_birth": "DD/MM/YYYY",
  "id_numbers": "ID-XXX-YYY-ZZZ",
  "policy_details": {
    "insurer_name": "ABC Insurance",
    "policy_number": "POL123456"
  },
  "contact": {
    "phone": "+1-555-0123",
    "email": "example@email.com",
    "address": "Full address"
  }
}

Use null for any field that is not found.

Pages:
{pages}"#;

/// Default discharge-summary / prescription stage prompt.
pub const DISCHARGE_SUMMARY_PROMPT: &str = r#"You are a medical claim discharge summary extractor.

Extract the following from these discharge summary and prescription pages:
- Primary diagnosis
- Admission date
- Discharge date
- Treating physician (name, specialization)
- Treatment summary
- Prescribed medicines

Respond with ONLY a JSON object of this shape. No explanation, no markdown.
{
  "diagnosis": {
    "primary": "Primary diagnosis"
  },
  "admit_date": "DD/MM/YYYY",
  "discharge_date": "DD/MM/YYYY",
  "physician": {
    "name": "Dr. Jane Smith",
    "specialization": "Cardiology"
  },
  "treatment_summary": "Brief summary of treatment",
  "prescribed_medicines": ["Med 1", "Med 2"]
}

Use null for any field that is not found.

Pages:
{pages}"#;

/// Default itemized-bill stage prompt.
pub const ITEMIZED_BILL_PROMPT: &str = r#"You are a medical claim itemized bill extractor.

Extract ALL billing items from these itemized bill pages:
- Item description
- Quantity, if present
- Unit cost
- Total cost of the line
- Category (consultation, pharmacy, procedure, room, ...), if present

Also report the bill's total amount as printed on the bill.

Respond with ONLY a JSON object of this shape. No explanation, no markdown.
{
  "items": [
    {
      "description": "Item name",
      "category": "consultation",
      "quantity": 1,
      "unit_cost": 100.0,
      "total_cost": 100.0
    }
  ],
  "total_amount": 100.0
}

Use null for any field that is not found.

Pages:
{pages}"#;

/// A prompt with a `{pages}` slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_placeholder(&self) -> bool {
        self.0.contains(PAGES_PLACEHOLDER)
    }

    /// Substitute the page listing.
    pub fn render(&self, pages: &str) -> String {
        self.0.replace(PAGES_PLACEHOLDER, pages)
    }
}

/// The four templates used by one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub classifier: PromptTemplate,
    pub identity: PromptTemplate,
    pub discharge_summary: PromptTemplate,
    pub itemized_bill: PromptTemplate,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            classifier: PromptTemplate::new(CLASSIFIER_PROMPT),
            identity: PromptTemplate::new(IDENTITY_PROMPT),
            discharge_summary: PromptTemplate::new(DISCHARGE_SUMMARY_PROMPT),
            itemized_bill: PromptTemplate::new(ITEMIZED_BILL_PROMPT),
        }
    }
}

impl PromptSet {
    /// Names of templates missing the `{pages}` placeholder.
    pub fn missing_placeholders(&self) -> Vec<&'static str> {
        [
            ("classifier", &self.classifier),
            ("identity", &self.identity),
            ("discharge_summary", &self.discharge_summary),
            ("itemized_bill", &self.itemized_bill),
        ]
        .into_iter()
        .filter(|(_, t)| !t.has_placeholder())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Format pages as the `Page N:` listing shared by every prompt.
///
/// `max_chars` truncates each page's text to a prefix of that many characters
/// (the classifier's preview); `None` keeps the full text.
pub fn page_listing<'a>(
    pages: impl IntoIterator<Item = &'a crate::document::Page>,
    max_chars: Option<usize>,
) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(&format!("Page {}:\n", page.page_number));
        match max_chars {
            Some(n) => out.extend(page.text.chars().take(n)),
            None => out.push_str(&page.text),
        }
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;

    #[test]
    fn default_prompts_have_placeholders() {
        assert!(PromptSet::default().missing_placeholders().is_empty());
    }

    #[test]
    fn classifier_prompt_lists_canonical_vocabulary() {
        for tag in crate::document::DocTag::ALL {
            assert!(
                CLASSIFIER_PROMPT.contains(&format!("- {}\n", tag.as_str())),
                "missing {tag}"
            );
        }
        assert!(!CLASSIFIER_PROMPT.contains("itemized_hospital_bill"));
    }

    #[test]
    fn missing_placeholder_is_reported() {
        let set = PromptSet {
            identity: PromptTemplate::new("no slot here"),
            ..PromptSet::default()
        };
        assert_eq!(set.missing_placeholders(), vec!["identity"]);
    }

    #[test]
    fn listing_truncates_by_characters() {
        let pages = [Page::new(1, "héllo world"), Page::new(2, "")];
        assert_eq!(
            page_listing(&pages, Some(5)),
            "Page 1:\nhéllo\n\nPage 2:\n\n\n"
        );
        assert_eq!(
            page_listing(&pages[..1], None),
            "Page 1:\nhéllo world\n\n"
        );
    }

    #[test]
    fn render_substitutes_pages() {
        let t = PromptTemplate::new("Pages:\n{pages}");
        assert_eq!(t.render("Page 1:\nx\n\n"), "Pages:\nPage 1:\nx\n\n");
    }
}
