//! Extraction stages: turn the pages of one document type into a record.
//!
//! All three stages share one shape, [`ExtractionStage`]; they differ only in
//! the tags they consume ([`StageName::consumed_tags`]), their prompt, and a
//! stage-specific finishing step (the bill stage attaches a locally computed
//! `calculated_total`).
//!
//! A stage never fails the run. No assigned pages, a collaborator error, a
//! timeout and an undecodable reply all resolve to [`StageResult::Absent`].

use crate::document::{DocumentState, StageName, StageResult, StateUpdate};
use crate::error::StageError;
use crate::pipeline::decode::extract_json;
use crate::pipeline::llm::{complete_within, Completer};
use crate::prompts::{page_listing, PromptSet, PromptTemplate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One configured extraction stage.
#[derive(Debug, Clone)]
pub struct ExtractionStage {
    name: StageName,
    prompt: PromptTemplate,
}

impl ExtractionStage {
    pub fn new(name: StageName, prompt: PromptTemplate) -> Self {
        Self { name, prompt }
    }

    /// The three stages in execution order, with prompts taken from `prompts`.
    pub fn all(prompts: &PromptSet) -> [ExtractionStage; 3] {
        [
            Self::new(StageName::Identity, prompts.identity.clone()),
            Self::new(StageName::DischargeSummary, prompts.discharge_summary.clone()),
            Self::new(StageName::ItemizedBill, prompts.itemized_bill.clone()),
        ]
    }

    pub fn name(&self) -> StageName {
        self.name
    }

    /// Build the prompt from the full text of the assigned pages, or `None`
    /// when no page is assigned to this stage.
    pub fn build_prompt(&self, state: &DocumentState) -> Option<String> {
        let assigned = state.assigned_pages(self.name);
        if assigned.is_empty() {
            return None;
        }
        let pages = state.select_pages(&assigned);
        Some(self.prompt.render(&page_listing(pages, None)))
    }

    /// Run the stage against `state`. Never fails.
    pub async fn run(
        &self,
        state: &DocumentState,
        completer: &dyn Completer,
        timeout: Duration,
    ) -> StateUpdate {
        let result = match self.build_prompt(state) {
            None => {
                debug!("Stage '{}': no assigned pages", self.name);
                StageResult::Absent
            }
            Some(prompt) => match self.request(&prompt, completer, timeout).await {
                Ok(record) => {
                    info!("Stage '{}': extracted {} fields", self.name, record.len());
                    StageResult::Extracted(record)
                }
                Err(e) => {
                    warn!("Stage '{}' failed, result is absent: {}", self.name, e);
                    StageResult::Absent
                }
            },
        };

        StateUpdate::Stage {
            stage: self.name,
            result,
        }
    }

    async fn request(
        &self,
        prompt: &str,
        completer: &dyn Completer,
        timeout: Duration,
    ) -> Result<Map<String, Value>, StageError> {
        let reply = complete_within(completer, prompt, timeout).await?;
        let mut record = extract_json(&reply)?;
        self.finish(&mut record);
        Ok(record)
    }

    fn finish(&self, record: &mut Map<String, Value>) {
        if self.name == StageName::ItemizedBill {
            let total = calculated_total(record)
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number);
            record.insert("calculated_total".into(), total);
        }
    }
}

/// Sum of `total_cost` over `items`, rounded to cents.
///
/// Costs may be numbers or strings carrying a currency mark and digit
/// grouping ("₹1,20,000.00", "$349.25", "Rs. 50"); anything without a
/// number is skipped. `None` when the record has no `items` list. The
/// collaborator's own `total_amount` is left untouched.
pub fn calculated_total(record: &Map<String, Value>) -> Option<f64> {
    let items = record.get("items")?.as_array()?;
    let sum = items
        .iter()
        .filter_map(|item| item.get("total_cost"))
        .filter_map(cost_value)
        .fold(0.0, |acc, cost| acc + cost);
    // `+ 0.0` turns a rounded -0.0 into 0.0.
    Some((sum * 100.0).round() / 100.0 + 0.0)
}

/// First decimal number in a cost string, after grouping commas are removed.
static RE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

fn cost_value(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let plain = s.replace(',', "");
            RE_AMOUNT
                .find(&plain)
                .and_then(|m| m.as_str().parse().ok())
        }
        _ => None,
    };
    if parsed.is_none() {
        debug!(cost = %v, "Skipping item cost that is not a number");
    }
    parsed
}
