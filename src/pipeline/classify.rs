//! Page classifier: assign each page to zero or more document-type buckets.
//!
//! One collaborator call per run, not per page. The prompt enumerates every
//! page with only a bounded prefix of its text, trading some per-page
//! accuracy for a single cheap request.
//!
//! Failure policy is silent degradation: a collaborator error, a timeout or an
//! undecodable reply yields an empty [`Classification`]. Nothing is retried.

use crate::document::{Classification, DocTag, DocumentState, StateUpdate};
use crate::error::StageError;
use crate::pipeline::decode::extract_json;
use crate::pipeline::llm::{complete_within, Completer};
use crate::prompts::{page_listing, PromptTemplate};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The classifier, configured with its prompt and preview length.
#[derive(Debug, Clone)]
pub struct PageClassifier {
    prompt: PromptTemplate,
    preview_chars: usize,
}

impl PageClassifier {
    pub fn new(prompt: PromptTemplate, preview_chars: usize) -> Self {
        Self {
            prompt,
            preview_chars,
        }
    }

    /// Build the single classification prompt for `state`'s pages.
    pub fn build_prompt(&self, state: &DocumentState) -> String {
        self.prompt
            .render(&page_listing(state.pages(), Some(self.preview_chars)))
    }

    /// Classify the pages of `state`. Never fails.
    pub async fn classify(
        &self,
        state: &DocumentState,
        completer: &dyn Completer,
        timeout: Duration,
    ) -> StateUpdate {
        if state.pages().is_empty() {
            debug!("No pages to classify");
            return StateUpdate::Classified(Classification::new());
        }

        let prompt = self.build_prompt(state);
        debug!(
            "Classifying {} pages ({} prompt chars)",
            state.pages().len(),
            prompt.len()
        );

        let classification = match self.request(&prompt, completer, timeout).await {
            Ok(raw) => {
                let known: BTreeSet<u32> = state.pages().iter().map(|p| p.page_number).collect();
                parse_classification(&raw, &known)
            }
            Err(e) => {
                warn!("Classifier failed, continuing with no classified pages: {}", e);
                Classification::new()
            }
        };

        info!(
            "Classified {} page slots across {} tags",
            classification.classified_pages(),
            classification.iter().count()
        );
        StateUpdate::Classified(classification)
    }

    async fn request(
        &self,
        prompt: &str,
        completer: &dyn Completer,
        timeout: Duration,
    ) -> Result<Map<String, Value>, StageError> {
        let reply = complete_within(completer, prompt, timeout).await?;
        Ok(extract_json(&reply)?)
    }
}

/// Turn a decoded classifier reply into a [`Classification`].
///
/// Keys are normalised through [`DocTag::from_label`]; unknown keys are
/// dropped. Values may be a list of page numbers or a single number;
/// anything that is not a page of this document is dropped.
pub fn parse_classification(raw: &Map<String, Value>, known_pages: &BTreeSet<u32>) -> Classification {
    let mut classification = Classification::new();

    for (label, value) in raw {
        let Some(tag) = DocTag::from_label(label) else {
            warn!("Ignoring unknown document type '{}'", label);
            continue;
        };

        let entries: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            single => vec![single],
        };

        for entry in entries {
            match page_number(entry) {
                Some(p) if known_pages.contains(&p) => classification.insert(tag, p),
                Some(p) => warn!("Ignoring page {} for '{}': not in document", p, tag),
                None => warn!("Ignoring non-numeric page {} for '{}'", entry, tag),
            }
        }
    }

    classification
}

/// Page numbers arrive as integers, integral floats (`2.0`) or strings.
fn page_number(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => match n.as_u64() {
            Some(n) => u32::try_from(n).ok(),
            None => n.as_f64().and_then(integral_page),
        },
        Value::String(s) => {
            let s = s.trim();
            s.parse()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_page))
        }
        _ => None,
    }
}

fn integral_page(f: f64) -> Option<u32> {
    (f.fract() == 0.0 && f >= 1.0 && f <= f64::from(u32::MAX)).then_some(f as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;
    use crate::prompts::CLASSIFIER_PROMPT;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        reply: Result<String, StageError>,
        prompts: Mutex<Vec<String>>,
    }

    impl Recording {
        fn replying(reply: Result<&str, StageError>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Completer for Recording {
        async fn complete(&self, prompt: &str) -> Result<String, StageError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn classifier() -> PageClassifier {
        PageClassifier::new(PromptTemplate::new(CLASSIFIER_PROMPT), 10)
    }

    fn state(texts: &[&str]) -> DocumentState {
        DocumentState::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| Page::new(i as u32 + 1, *t))
                .collect(),
        )
        .unwrap()
    }

    fn known(pages: &[u32]) -> BTreeSet<u32> {
        pages.iter().copied().collect()
    }

    fn as_map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn parse_normalises_and_filters() {
        let raw = as_map(json!({
            "Identity Document": [1],
            "itemized_hospital_bill": [2, "3", 3, 9],
            "lab_results": [4],
            "prescription": 4,
            "other": null,
            "cash_receipt": [-1, 1.5, true]
        }));
        let c = parse_classification(&raw, &known(&[1, 2, 3, 4]));
        let expected: Classification = [
            (DocTag::IdentityDocument, 1),
            (DocTag::ItemizedBill, 2),
            (DocTag::ItemizedBill, 3),
            (DocTag::Prescription, 4),
        ]
        .into_iter()
        .collect();
        assert_eq!(c, expected);
    }

    #[test]
    fn integral_float_pages_are_accepted() {
        let raw = as_map(json!({
            "itemized_bill": [2.0, 3.0, "4.0", 0.0, 2.5],
            "discharge_summary": 1.0
        }));
        let c = parse_classification(&raw, &known(&[1, 2, 3, 4]));
        assert_eq!(
            c.pages(DocTag::ItemizedBill).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(
            c.pages(DocTag::DischargeSummary).collect::<Vec<_>>(),
            vec![1]
        );
    }

    #[test]
    fn prompt_truncates_each_page() {
        let s = state(&["0123456789ABCDEF", "short"]);
        let prompt = classifier().build_prompt(&s);
        assert!(prompt.contains("Page 1:\n0123456789\n\n"));
        assert!(!prompt.contains("ABCDEF"));
        assert!(prompt.contains("Page 2:\nshort\n\n"));
    }

    #[tokio::test]
    async fn one_call_for_the_whole_document() {
        let s = state(&["a", "b", "c"]);
        let completer = Recording::replying(Ok(
            "```json\n{\"identity_document\": [1], \"itemized_bill\": [2, 3]}\n```",
        ));
        let update = classifier()
            .classify(&s, &completer, Duration::from_secs(5))
            .await;

        assert_eq!(completer.prompts.lock().unwrap().len(), 1);
        let StateUpdate::Classified(c) = update else {
            panic!("expected a classification update");
        };
        assert_eq!(c.pages(DocTag::ItemizedBill).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(c.classified_pages(), 3);
    }

    #[tokio::test]
    async fn collaborator_error_degrades_to_empty() {
        let s = state(&["a"]);
        let completer = Recording::replying(Err(StageError::Collaborator {
            detail: "503".into(),
        }));
        let update = classifier()
            .classify(&s, &completer, Duration::from_secs(5))
            .await;
        assert_eq!(update, StateUpdate::Classified(Classification::new()));
    }

    #[tokio::test]
    async fn undecodable_reply_degrades_to_empty() {
        let s = state(&["a"]);
        let completer = Recording::replying(Ok("I am not sure what these pages are."));
        let update = classifier()
            .classify(&s, &completer, Duration::from_secs(5))
            .await;
        assert_eq!(update, StateUpdate::Classified(Classification::new()));
    }

    #[tokio::test]
    async fn empty_document_skips_the_call() {
        let s = DocumentState::new(Vec::new()).unwrap();
        let completer = Recording::replying(Ok("{}"));
        let update = classifier()
            .classify(&s, &completer, Duration::from_secs(5))
            .await;
        assert!(completer.prompts.lock().unwrap().is_empty());
        assert_eq!(update, StateUpdate::Classified(Classification::new()));
    }
}
