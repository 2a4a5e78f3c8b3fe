//! Error taxonomy for workflow operations.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use super::state::{Step, WorkflowState};
use crate::export::ExportError;
use crate::generation::GenerationError;
use crate::prompt::PromptError;

/// Errors surfaced by the workflow controller and session store.
///
/// Every error is scoped to the session and operation that raised it.
/// None are retried automatically; the caller may re-invoke the step.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The step's prerequisite data is missing from the session.
    #[error("precondition failed: {0}")]
    PreconditionState(String),

    /// The step does not follow from the session's current state.
    #[error("cannot run step {step} from state {from}")]
    InvalidStepTransition { from: WorkflowState, step: Step },

    /// The caller supplied unusable input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("generation service error: {0}")]
    GenerationService(String),

    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// The provider answered, but not in a form the step can commit.
    #[error("malformed {step} response: {reason}")]
    MalformedResponse { step: Step, reason: String },

    /// The consumer stopped listening before the step finished. Nothing was
    /// committed.
    #[error("{step} cancelled before completion")]
    Cancelled { step: Step },

    #[error("export failed: {0}")]
    ExportIo(#[source] ExportError),

    /// Another operation is already in flight for this session.
    #[error("session {0} is busy with another operation")]
    Busy(Uuid),

    #[error("unknown session {0}")]
    UnknownSession(Uuid),
}

impl WorkflowError {
    /// Stable machine-readable name for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PreconditionState(_) => "precondition_state",
            Self::InvalidStepTransition { .. } => "invalid_step_transition",
            Self::InvalidInput(_) => "invalid_input",
            Self::GenerationService(_) => "generation_service",
            Self::GenerationTimeout(_) => "generation_timeout",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Cancelled { .. } => "cancelled",
            Self::ExportIo(_) => "export_io",
            Self::Busy(_) => "busy",
            Self::UnknownSession(_) => "unknown_session",
        }
    }

    /// Map a provider error onto the taxonomy. Malformed provider output is
    /// attributed to `step`.
    pub(crate) fn from_generation(step: Step, err: GenerationError) -> Self {
        match err {
            GenerationError::Timeout(after) => Self::GenerationTimeout(after),
            GenerationError::Malformed(reason) => Self::MalformedResponse { step, reason },
            GenerationError::Service(msg) | GenerationError::Config(msg) => {
                Self::GenerationService(msg)
            }
        }
    }
}

impl From<PromptError> for WorkflowError {
    fn from(err: PromptError) -> Self {
        Self::PreconditionState(err.to_string())
    }
}

impl From<ExportError> for WorkflowError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Incomplete { .. } => Self::PreconditionState(err.to_string()),
            other => Self::ExportIo(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_snake_case_and_distinct() {
        let id = Uuid::new_v4();
        let errors = [
            WorkflowError::PreconditionState("x".into()),
            WorkflowError::InvalidStepTransition {
                from: WorkflowState::AwaitingKeywordInput,
                step: Step::DraftArticle,
            },
            WorkflowError::InvalidInput("x".into()),
            WorkflowError::GenerationService("x".into()),
            WorkflowError::GenerationTimeout(Duration::from_secs(1)),
            WorkflowError::MalformedResponse {
                step: Step::LsiResearch,
                reason: "x".into(),
            },
            WorkflowError::Cancelled {
                step: Step::DraftArticle,
            },
            WorkflowError::ExportIo(ExportError::Io {
                path: "/x".into(),
                source: std::io::Error::other("x"),
            }),
            WorkflowError::Busy(id),
            WorkflowError::UnknownSession(id),
        ];
        let mut kinds: Vec<&str> = errors.iter().map(WorkflowError::kind).collect();
        for kind in &kinds {
            assert!(kind.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn generation_errors_map_onto_taxonomy() {
        let step = Step::ContentBrief;
        assert!(matches!(
            WorkflowError::from_generation(step, GenerationError::Service("down".into())),
            WorkflowError::GenerationService(msg) if msg == "down"
        ));
        assert!(matches!(
            WorkflowError::from_generation(step, GenerationError::Timeout(Duration::from_secs(3))),
            WorkflowError::GenerationTimeout(d) if d == Duration::from_secs(3)
        ));
        assert!(matches!(
            WorkflowError::from_generation(step, GenerationError::Malformed("bad".into())),
            WorkflowError::MalformedResponse { step: Step::ContentBrief, .. }
        ));
    }

    #[test]
    fn incomplete_export_is_a_precondition_failure() {
        let err: WorkflowError = ExportError::Incomplete { missing: "article" }.into();
        assert_eq!(err.kind(), "precondition_state");
    }

    #[test]
    fn display_names_state_and_step() {
        let err = WorkflowError::InvalidStepTransition {
            from: WorkflowState::BriefBuilt,
            step: Step::Refine,
        };
        assert_eq!(err.to_string(), "cannot run step refine from state brief_built");
    }
}
