//! Workflow controller: drives one session through the six steps.
//!
//! The controller owns no sessions. Callers hand it a `&mut Session` they
//! hold exclusively (see [`store::SessionStore`]) and it validates the step
//! against the state machine, builds the prompt, runs the generator, parses
//! the output and commits it. Nothing is written to the session unless the
//! whole step succeeds.

pub mod error;
pub mod state;
pub mod store;

use std::sync::Arc;

use chrono::{Local, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::export::{ExportOutcome, ExportWriter};
use crate::generation::Generator;
use crate::parse;
use crate::presets::RefineInstruction;
use crate::prompt::{self, PromptSettings};
use crate::session::{KeywordInputs, LsiResearch, RefinementEntry, Session};

pub use error::WorkflowError;
pub use state::{Step, WorkflowState, WorkflowStateMachine};
pub use store::{SessionGuard, SessionStore};

/// Receives text fragments as the generator produces them. Dropping the
/// receiving half cancels the step in flight.
pub type ChunkSink = mpsc::Sender<String>;

/// Input for one [`WorkflowController::advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    KeywordIntake(KeywordInputs),
    LsiResearch,
    ContentBrief,
    DraftArticle,
}

impl StepInput {
    pub fn step(&self) -> Step {
        match self {
            Self::KeywordIntake(_) => Step::KeywordIntake,
            Self::LsiResearch => Step::LsiResearch,
            Self::ContentBrief => Step::ContentBrief,
            Self::DraftArticle => Step::DraftArticle,
        }
    }

    /// The payload-free input for a generation step, if `step` is one that
    /// `advance` runs.
    pub fn for_generation_step(step: Step) -> Option<Self> {
        match step {
            Step::LsiResearch => Some(Self::LsiResearch),
            Step::ContentBrief => Some(Self::ContentBrief),
            Step::DraftArticle => Some(Self::DraftArticle),
            Step::KeywordIntake | Step::Refine | Step::Export => None,
        }
    }
}

/// What a successful step committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: Step,
    /// Session state after the step.
    pub state: WorkflowState,
    /// Full generated text, for generation steps.
    pub text: Option<String>,
}

pub struct WorkflowController {
    generator: Arc<dyn Generator>,
    settings: PromptSettings,
    exporter: ExportWriter,
}

impl WorkflowController {
    pub fn new(
        generator: Arc<dyn Generator>,
        settings: PromptSettings,
        exporter: ExportWriter,
    ) -> Self {
        Self {
            generator,
            settings,
            exporter,
        }
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    pub fn exporter(&self) -> &ExportWriter {
        &self.exporter
    }

    /// The state `step` would move `session` to, or
    /// [`WorkflowError::InvalidStepTransition`].
    pub fn ensure_transition(
        &self,
        session: &Session,
        step: Step,
    ) -> Result<WorkflowState, WorkflowError> {
        WorkflowStateMachine::next_state(session.state, step).ok_or(
            WorkflowError::InvalidStepTransition {
                from: session.state,
                step,
            },
        )
    }

    /// Run one forward step.
    ///
    /// With a `sink`, generated text is relayed chunk by chunk as it
    /// arrives; without one the generator's one-shot completion is used.
    /// If the sink's receiver goes away mid-stream the provider stream is
    /// dropped and the step fails with [`WorkflowError::Cancelled`].
    pub async fn advance(
        &self,
        session: &mut Session,
        input: StepInput,
        sink: Option<&ChunkSink>,
    ) -> Result<StepOutcome, WorkflowError> {
        let step = input.step();
        let next = self.ensure_transition(session, step)?;

        let text = match input {
            StepInput::KeywordIntake(inputs) => {
                let inputs = inputs.normalize();
                if inputs.primary_keyword.is_empty() {
                    return Err(WorkflowError::InvalidInput(
                        "primary keyword is required".to_string(),
                    ));
                }
                tracing::info!(
                    session_id = %session.id,
                    keyword = %inputs.primary_keyword,
                    "keyword intake recorded"
                );
                session.inputs = Some(inputs);
                None
            }
            StepInput::LsiResearch => {
                let text = self.generate(session, step, None, sink).await?;
                let keywords = parse::parse_lsi_table(&text);
                if keywords.is_empty() {
                    return Err(WorkflowError::MalformedResponse {
                        step,
                        reason: "no keyword rows found in research table".to_string(),
                    });
                }
                session.lsi = Some(LsiResearch {
                    keywords,
                    notes: text.clone(),
                });
                Some(text)
            }
            StepInput::ContentBrief => {
                let text = self.generate(session, step, None, sink).await?;
                let brief = parse::parse_brief(&text);
                if let Some(missing) = brief.missing_field() {
                    return Err(WorkflowError::MalformedResponse {
                        step,
                        reason: format!("brief has no {missing}"),
                    });
                }
                session.brief = Some(brief);
                Some(text)
            }
            StepInput::DraftArticle => {
                let text = self.generate(session, step, None, sink).await?;
                session.article = Some(text.clone());
                Some(text)
            }
        };

        session.state = next;
        tracing::info!(session_id = %session.id, step = %step, state = %next, "step committed");

        Ok(StepOutcome {
            step,
            state: next,
            text,
        })
    }

    /// Rewrite the current article according to `instruction`.
    ///
    /// Valid from `article_drafted` and `refining`. Each success replaces
    /// the article and appends one entry to the refinement history.
    pub async fn refine(
        &self,
        session: &mut Session,
        instruction: RefineInstruction,
        sink: Option<&ChunkSink>,
    ) -> Result<StepOutcome, WorkflowError> {
        let step = Step::Refine;
        let next = self.ensure_transition(session, step)?;
        let directive = instruction
            .directive()
            .map_err(WorkflowError::InvalidInput)?;

        let text = self.generate(session, step, Some(&directive), sink).await?;

        let previous_text = session.article.replace(text.clone()).unwrap_or_default();
        session.refinements.push(RefinementEntry {
            instruction,
            directive,
            previous_text,
            result_text: text.clone(),
            refined_at: Utc::now(),
        });
        session.state = next;

        tracing::info!(
            session_id = %session.id,
            refinements = session.refinements.len(),
            "refinement committed"
        );

        Ok(StepOutcome {
            step,
            state: next,
            text: Some(text),
        })
    }

    /// Export the session's current article. Can be repeated; each call
    /// writes a new file pair.
    pub fn finalize(&self, session: &mut Session) -> Result<ExportOutcome, WorkflowError> {
        let next = self.ensure_transition(session, Step::Export)?;
        let outcome = self.exporter.write(session, Local::now())?;
        session.last_export = Some(outcome.paths.clone());
        session.state = next;
        Ok(outcome)
    }

    async fn generate(
        &self,
        session: &Session,
        step: Step,
        refine_directive: Option<&str>,
        sink: Option<&ChunkSink>,
    ) -> Result<String, WorkflowError> {
        let request = prompt::build(step, session, &self.settings, refine_directive)?
            .ok_or_else(|| {
                WorkflowError::PreconditionState(format!("{step} does not generate text"))
            })?;

        tracing::info!(
            session_id = %session.id,
            step = %step,
            generator = self.generator.name(),
            max_tokens = request.max_tokens,
            streaming = sink.is_some(),
            "generation started"
        );

        let failed = |err| {
            let err = WorkflowError::from_generation(step, err);
            tracing::warn!(
                session_id = %session.id,
                step = %step,
                error = %err,
                "generation failed"
            );
            err
        };

        let text = match sink {
            None => self.generator.complete(&request).await.map_err(failed)?,
            Some(sink) => {
                let mut stream = self.generator.stream(request);
                let mut text = String::new();
                let mut chunks = 0usize;
                loop {
                    let item = tokio::select! {
                        biased;
                        () = sink.closed() => None,
                        item = stream.next() => Some(item),
                    };
                    let chunk = match item {
                        None => {
                            drop(stream);
                            tracing::info!(
                                session_id = %session.id,
                                step = %step,
                                chunks,
                                "consumer disconnected, generation cancelled"
                            );
                            return Err(WorkflowError::Cancelled { step });
                        }
                        Some(None) => break,
                        Some(Some(chunk)) => chunk.map_err(failed)?,
                    };
                    if chunk.is_empty() {
                        continue;
                    }
                    text.push_str(&chunk);
                    chunks += 1;
                    if sink.send(chunk).await.is_err() {
                        drop(stream);
                        tracing::info!(
                            session_id = %session.id,
                            step = %step,
                            chunks,
                            "consumer disconnected, generation cancelled"
                        );
                        return Err(WorkflowError::Cancelled { step });
                    }
                }
                tracing::debug!(
                    session_id = %session.id,
                    step = %step,
                    chunks,
                    bytes = text.len(),
                    "stream finished"
                );
                text
            }
        };

        if text.trim().is_empty() {
            return Err(WorkflowError::MalformedResponse {
                step,
                reason: "provider returned no text".to_string(),
            });
        }
        Ok(text)
    }
}
