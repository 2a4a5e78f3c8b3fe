//! Workflow state machine.
//!
//! Enforces the valid transition graph for a session:
//!
//! ```text
//! awaiting_keyword_input --keyword_intake--> awaiting_keyword_input
//! awaiting_keyword_input --lsi_research----> lsi_generated
//! lsi_generated          --content_brief---> brief_built
//! brief_built            --draft_article---> article_drafted
//! article_drafted        --refine----------> refining
//! refining               --refine----------> refining
//! article_drafted        --export----------> exported
//! refining               --export----------> exported
//! exported               --export----------> exported   (re-export)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The six workflow steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    KeywordIntake,
    LsiResearch,
    ContentBrief,
    DraftArticle,
    Refine,
    Export,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::KeywordIntake,
        Step::LsiResearch,
        Step::ContentBrief,
        Step::DraftArticle,
        Step::Refine,
        Step::Export,
    ];

    /// 1-based position of the step in the workflow.
    pub fn index(self) -> u8 {
        match self {
            Step::KeywordIntake => 1,
            Step::LsiResearch => 2,
            Step::ContentBrief => 3,
            Step::DraftArticle => 4,
            Step::Refine => 5,
            Step::Export => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::KeywordIntake => "keyword_intake",
            Step::LsiResearch => "lsi_research",
            Step::ContentBrief => "content_brief",
            Step::DraftArticle => "draft_article",
            Step::Refine => "refine",
            Step::Export => "export",
        }
    }

    /// Whether running this step calls the generation service.
    pub fn requires_generation(self) -> bool {
        !matches!(self, Step::KeywordIntake | Step::Export)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step: {0:?}")]
pub struct UnknownStep(pub String);

impl FromStr for Step {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}

/// Where a session is in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    AwaitingKeywordInput,
    LsiGenerated,
    BriefBuilt,
    ArticleDrafted,
    Refining,
    Exported,
}

impl WorkflowState {
    /// The step whose output this state displays.
    pub fn step(self) -> Step {
        match self {
            WorkflowState::AwaitingKeywordInput => Step::KeywordIntake,
            WorkflowState::LsiGenerated => Step::LsiResearch,
            WorkflowState::BriefBuilt => Step::ContentBrief,
            WorkflowState::ArticleDrafted => Step::DraftArticle,
            WorkflowState::Refining => Step::Refine,
            WorkflowState::Exported => Step::Export,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::AwaitingKeywordInput => "awaiting_keyword_input",
            WorkflowState::LsiGenerated => "lsi_generated",
            WorkflowState::BriefBuilt => "brief_built",
            WorkflowState::ArticleDrafted => "article_drafted",
            WorkflowState::Refining => "refining",
            WorkflowState::Exported => "exported",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The session state machine's transition table.
pub struct WorkflowStateMachine;

impl WorkflowStateMachine {
    /// The state reached by running `step` from `from`, or `None` if the
    /// step does not follow `from`.
    pub fn next_state(from: WorkflowState, step: Step) -> Option<WorkflowState> {
        use WorkflowState::*;

        match (from, step) {
            (AwaitingKeywordInput, Step::KeywordIntake) => Some(AwaitingKeywordInput),
            (AwaitingKeywordInput, Step::LsiResearch) => Some(LsiGenerated),
            (LsiGenerated, Step::ContentBrief) => Some(BriefBuilt),
            (BriefBuilt, Step::DraftArticle) => Some(ArticleDrafted),
            (ArticleDrafted | Refining, Step::Refine) => Some(Refining),
            (ArticleDrafted | Refining | Exported, Step::Export) => Some(Exported),
            _ => None,
        }
    }

    /// Check whether `step` may run from `from`.
    pub fn is_valid_transition(from: WorkflowState, step: Step) -> bool {
        Self::next_state(from, step).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [WorkflowState; 6] = [
        WorkflowState::AwaitingKeywordInput,
        WorkflowState::LsiGenerated,
        WorkflowState::BriefBuilt,
        WorkflowState::ArticleDrafted,
        WorkflowState::Refining,
        WorkflowState::Exported,
    ];

    #[test]
    fn forward_path_reaches_exported() {
        let path = [
            (Step::KeywordIntake, WorkflowState::AwaitingKeywordInput),
            (Step::LsiResearch, WorkflowState::LsiGenerated),
            (Step::ContentBrief, WorkflowState::BriefBuilt),
            (Step::DraftArticle, WorkflowState::ArticleDrafted),
            (Step::Refine, WorkflowState::Refining),
            (Step::Export, WorkflowState::Exported),
        ];

        let mut state = WorkflowState::AwaitingKeywordInput;
        for (step, expected) in path {
            state = WorkflowStateMachine::next_state(state, step)
                .unwrap_or_else(|| panic!("{step} should follow {state}"));
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn refining_loops_on_itself() {
        let mut state = WorkflowState::ArticleDrafted;
        for _ in 0..5 {
            state = WorkflowStateMachine::next_state(state, Step::Refine).unwrap();
            assert_eq!(state, WorkflowState::Refining);
        }
    }

    #[test]
    fn export_can_repeat() {
        assert_eq!(
            WorkflowStateMachine::next_state(WorkflowState::Exported, Step::Export),
            Some(WorkflowState::Exported)
        );
    }

    #[test]
    fn out_of_order_steps_are_rejected() {
        use WorkflowState::*;

        let rejected = [
            (AwaitingKeywordInput, Step::ContentBrief),
            (AwaitingKeywordInput, Step::DraftArticle),
            (AwaitingKeywordInput, Step::Refine),
            (AwaitingKeywordInput, Step::Export),
            (LsiGenerated, Step::KeywordIntake),
            (LsiGenerated, Step::LsiResearch),
            (LsiGenerated, Step::DraftArticle),
            (BriefBuilt, Step::ContentBrief),
            (BriefBuilt, Step::Refine),
            (BriefBuilt, Step::Export),
            (ArticleDrafted, Step::DraftArticle),
            (Refining, Step::DraftArticle),
            (Exported, Step::Refine),
            (Exported, Step::KeywordIntake),
        ];
        for (from, step) in rejected {
            assert!(
                !WorkflowStateMachine::is_valid_transition(from, step),
                "{step} should not be allowed from {from}"
            );
        }
    }

    #[test]
    fn every_state_has_at_least_one_exit() {
        for state in ALL_STATES {
            assert!(
                Step::ALL
                    .iter()
                    .any(|step| WorkflowStateMachine::is_valid_transition(state, *step)),
                "{state} is a dead end"
            );
        }
    }

    #[test]
    fn step_round_trips_through_str() {
        for step in Step::ALL {
            assert_eq!(step.as_str().parse::<Step>().unwrap(), step);
        }
        assert!("publish".parse::<Step>().is_err());
    }

    #[test]
    fn only_intake_and_export_skip_generation() {
        let skipped: Vec<Step> = Step::ALL
            .into_iter()
            .filter(|s| !s.requires_generation())
            .collect();
        assert_eq!(skipped, vec![Step::KeywordIntake, Step::Export]);
    }

    #[test]
    fn state_step_indices_are_increasing() {
        let indices: Vec<u8> = ALL_STATES.iter().map(|s| s.step().index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
    }
}
