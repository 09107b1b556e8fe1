//! Stage router: an explicit state machine over the fixed stage order.
//!
//! ```text
//! AwaitingIdentity ─▶ AwaitingDischarge ─▶ AwaitingBill ─▶ Aggregating ─▶ Done
//! ```
//!
//! Each call to [`StageRouter::next`] looks at the current state and the
//! document: a stage that is already resolved is stepped over, a stage with
//! no assigned pages is skipped (the controller records it as absent without
//! invoking it), and otherwise the stage is scheduled to run. Either way the
//! router advances past it, so every stage is decided exactly once and in
//! order. Classification content only matters through presence or absence of
//! assigned pages.

use crate::document::{DocumentState, StageName};

/// Where the router is in the linear pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    AwaitingIdentity,
    AwaitingDischarge,
    AwaitingBill,
    Aggregating,
    Done,
}

impl RouterState {
    /// The stage this state waits on, if any.
    pub fn stage(self) -> Option<StageName> {
        match self {
            RouterState::AwaitingIdentity => Some(StageName::Identity),
            RouterState::AwaitingDischarge => Some(StageName::DischargeSummary),
            RouterState::AwaitingBill => Some(StageName::ItemizedBill),
            RouterState::Aggregating | RouterState::Done => None,
        }
    }

    fn successor(self) -> RouterState {
        match self {
            RouterState::AwaitingIdentity => RouterState::AwaitingDischarge,
            RouterState::AwaitingDischarge => RouterState::AwaitingBill,
            RouterState::AwaitingBill => RouterState::Aggregating,
            RouterState::Aggregating | RouterState::Done => RouterState::Done,
        }
    }
}

/// What the controller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Invoke this stage.
    Run(StageName),
    /// Record this stage as absent without invoking it.
    Skip(StageName),
    /// All stages are resolved; run the aggregator.
    Aggregate,
    /// The run is over.
    Finished,
}

#[derive(Debug, Clone)]
pub struct StageRouter {
    state: RouterState,
}

impl Default for StageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRouter {
    /// Router positioned right after classification.
    pub fn new() -> Self {
        Self {
            state: RouterState::AwaitingIdentity,
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Decide the next step from the current state and `doc`.
    pub fn next(&mut self, doc: &DocumentState) -> Route {
        loop {
            let Some(stage) = self.state.stage() else {
                return match self.state {
                    RouterState::Aggregating => Route::Aggregate,
                    _ => Route::Finished,
                };
            };

            self.state = self.state.successor();

            if doc.result(stage).is_attempted() {
                continue;
            }
            return if doc.assigned_pages(stage).is_empty() {
                Route::Skip(stage)
            } else {
                Route::Run(stage)
            };
        }
    }

    /// Mark aggregation as done. Only meaningful in `Aggregating`.
    pub fn complete(&mut self) {
        if self.state == RouterState::Aggregating {
            self.state = RouterState::Done;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Classification, DocTag, Page, StageResult, StateUpdate};

    fn doc(tags: &[(DocTag, u32)]) -> DocumentState {
        let mut d = DocumentState::new((1..=3).map(|i| Page::new(i, "")).collect()).unwrap();
        let c: Classification = tags.iter().copied().collect();
        d.apply(StateUpdate::Classified(c)).unwrap();
        d
    }

    #[test]
    fn starts_awaiting_identity() {
        assert_eq!(StageRouter::new().state(), RouterState::AwaitingIdentity);
    }

    #[test]
    fn empty_classification_skips_everything() {
        let d = doc(&[]);
        let mut r = StageRouter::new();
        assert_eq!(r.next(&d), Route::Skip(StageName::Identity));
        assert_eq!(r.state(), RouterState::AwaitingDischarge);
        assert_eq!(r.next(&d), Route::Skip(StageName::DischargeSummary));
        assert_eq!(r.next(&d), Route::Skip(StageName::ItemizedBill));
        assert_eq!(r.next(&d), Route::Aggregate);
        assert_eq!(r.state(), RouterState::Aggregating);
        r.complete();
        assert_eq!(r.state(), RouterState::Done);
        assert_eq!(r.next(&d), Route::Finished);
    }

    #[test]
    fn runs_only_stages_with_pages() {
        let d = doc(&[(DocTag::IdentityDocument, 1), (DocTag::ItemizedBill, 2), (DocTag::ItemizedBill, 3)]);
        let mut r = StageRouter::new();
        assert_eq!(r.next(&d), Route::Run(StageName::Identity));
        assert_eq!(r.next(&d), Route::Skip(StageName::DischargeSummary));
        assert_eq!(r.next(&d), Route::Run(StageName::ItemizedBill));
        assert_eq!(r.next(&d), Route::Aggregate);
    }

    #[test]
    fn any_consumed_tag_makes_a_stage_runnable() {
        let d = doc(&[(DocTag::ClaimForms, 1), (DocTag::Prescription, 2)]);
        let mut r = StageRouter::new();
        assert_eq!(r.next(&d), Route::Run(StageName::Identity));
        assert_eq!(r.next(&d), Route::Run(StageName::DischargeSummary));
        assert_eq!(r.next(&d), Route::Skip(StageName::ItemizedBill));
    }

    #[test]
    fn resolved_stages_are_stepped_over() {
        let mut d = doc(&[(DocTag::IdentityDocument, 1), (DocTag::DischargeSummary, 2)]);
        d.apply(StateUpdate::Stage {
            stage: StageName::Identity,
            result: StageResult::Absent,
        })
        .unwrap();
        let mut r = StageRouter::new();
        assert_eq!(r.next(&d), Route::Run(StageName::DischargeSummary));
        assert_eq!(r.state(), RouterState::AwaitingBill);
    }

    #[test]
    fn complete_outside_aggregating_is_a_no_op() {
        let mut r = StageRouter::new();
        r.complete();
        assert_eq!(r.state(), RouterState::AwaitingIdentity);
    }
}
