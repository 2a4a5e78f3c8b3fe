//! Prompt template library.
//!
//! Maps a (step, session) pair to the [`GenerationRequest`] for that step.
//! Pure: no I/O, no network access, no session mutation.

pub mod settings;
pub mod templates;

pub use settings::{Band, PromptSettings, StepTokenBudgets};

use crate::generation::GenerationRequest;
use crate::session::Session;
use crate::workflow::state::Step;

/// Errors from building a prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("cannot build the {step} prompt: {missing} is not available")]
    PreconditionState { step: Step, missing: &'static str },
}

fn require<'a, T>(
    value: Option<&'a T>,
    step: Step,
    missing: &'static str,
) -> Result<&'a T, PromptError> {
    value.ok_or(PromptError::PreconditionState { step, missing })
}

/// Build the generation request for `step` from the session's accumulated
/// state.
///
/// Returns `Ok(None)` for steps that need no generation call
/// (`keyword_intake`, `export`). `refine_directive` is the resolved
/// instruction text and is only consulted for [`Step::Refine`].
///
/// Fails with [`PromptError::PreconditionState`] when the step's
/// prerequisite data is absent from the session.
pub fn build(
    step: Step,
    session: &Session,
    settings: &PromptSettings,
    refine_directive: Option<&str>,
) -> Result<Option<GenerationRequest>, PromptError> {
    let Some(max_tokens) = settings.max_tokens.for_step(step) else {
        return Ok(None);
    };

    let inputs = require(session.inputs.as_ref(), step, "keyword input")?;

    let request = match step {
        Step::LsiResearch => {
            GenerationRequest::new(templates::lsi_research(inputs, settings), max_tokens)
        }
        Step::ContentBrief => {
            let lsi = require(session.lsi.as_ref(), step, "LSI keyword research")?;
            if lsi.keywords.is_empty() {
                return Err(PromptError::PreconditionState {
                    step,
                    missing: "LSI keyword research",
                });
            }
            GenerationRequest::new(templates::content_brief(inputs, lsi, settings), max_tokens)
        }
        Step::DraftArticle => {
            let lsi = require(session.lsi.as_ref(), step, "LSI keyword research")?;
            let brief = require(session.brief.as_ref(), step, "content brief")?;
            GenerationRequest::new(
                templates::draft_article(inputs, lsi, brief, settings),
                max_tokens,
            )
            .with_system(templates::COPYWRITER_SYSTEM)
        }
        Step::Refine => {
            let article = require(session.article.as_ref(), step, "article draft")?;
            let directive = refine_directive
                .filter(|d| !d.trim().is_empty())
                .ok_or(PromptError::PreconditionState {
                    step,
                    missing: "refinement instruction",
                })?;
            GenerationRequest::new(
                templates::refine(inputs, article, directive, settings),
                max_tokens,
            )
            .with_system(templates::COPYWRITER_SYSTEM)
        }
        Step::KeywordIntake | Step::Export => return Ok(None),
    };

    Ok(Some(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ContentBrief, KeywordInputs, LsiKeyword, LsiResearch};

    fn session_with_inputs() -> Session {
        let mut session = Session::new();
        session.inputs = Some(KeywordInputs::new("vegan protein bars"));
        session
    }

    fn lsi() -> LsiResearch {
        LsiResearch {
            keywords: vec![
                LsiKeyword {
                    keyword: "plant-based protein".to_string(),
                    volume: "medium".to_string(),
                    intent: None,
                },
                LsiKeyword {
                    keyword: "vegan snacks".to_string(),
                    volume: "high".to_string(),
                    intent: None,
                },
            ],
            notes: String::new(),
        }
    }

    #[test]
    fn intake_and_export_need_no_generation() {
        let settings = PromptSettings::default();
        let session = Session::new();
        assert_eq!(build(Step::KeywordIntake, &session, &settings, None), Ok(None));
        assert_eq!(build(Step::Export, &session, &settings, None), Ok(None));
    }

    #[test]
    fn lsi_requires_keyword_input() {
        let err = build(Step::LsiResearch, &Session::new(), &PromptSettings::default(), None)
            .unwrap_err();
        assert_eq!(
            err,
            PromptError::PreconditionState {
                step: Step::LsiResearch,
                missing: "keyword input"
            }
        );
    }

    #[test]
    fn brief_without_lsi_keywords_fails() {
        let settings = PromptSettings::default();
        let mut session = session_with_inputs();
        assert!(build(Step::ContentBrief, &session, &settings, None).is_err());

        session.lsi = Some(LsiResearch {
            keywords: Vec::new(),
            notes: "nothing useful".to_string(),
        });
        assert!(matches!(
            build(Step::ContentBrief, &session, &settings, None),
            Err(PromptError::PreconditionState { .. })
        ));
    }

    #[test]
    fn brief_prompt_incorporates_both_lsi_terms() {
        let mut session = session_with_inputs();
        session.lsi = Some(lsi());

        let request = build(Step::ContentBrief, &session, &PromptSettings::default(), None)
            .unwrap()
            .unwrap();
        assert!(request.prompt.contains("plant-based protein"));
        assert!(request.prompt.contains("vegan snacks"));
        assert_eq!(request.max_tokens, 1500);
        assert!(request.system.is_none());
    }

    #[test]
    fn draft_requires_brief_and_sets_system_prompt() {
        let settings = PromptSettings::default();
        let mut session = session_with_inputs();
        session.lsi = Some(lsi());
        assert!(build(Step::DraftArticle, &session, &settings, None).is_err());

        session.brief = Some(ContentBrief {
            outline: "## One".to_string(),
            title_tag: "T".to_string(),
            meta_description: "M".to_string(),
            ..ContentBrief::default()
        });
        let request = build(Step::DraftArticle, &session, &settings, None)
            .unwrap()
            .unwrap();
        assert_eq!(request.max_tokens, 4096);
        assert_eq!(request.system.as_deref(), Some(templates::COPYWRITER_SYSTEM));
    }

    #[test]
    fn refine_requires_article_and_directive() {
        let settings = PromptSettings::default();
        let mut session = session_with_inputs();
        assert!(build(Step::Refine, &session, &settings, Some("shorter")).is_err());

        session.article = Some("draft".to_string());
        assert!(build(Step::Refine, &session, &settings, None).is_err());
        assert!(build(Step::Refine, &session, &settings, Some("  ")).is_err());

        let request = build(Step::Refine, &session, &settings, Some("shorter"))
            .unwrap()
            .unwrap();
        assert!(request.prompt.contains("REFINEMENT REQUEST: shorter"));
    }

    #[test]
    fn token_budgets_come_from_settings() {
        let mut settings = PromptSettings::default();
        settings.max_tokens.lsi_research = 123;
        let request = build(Step::LsiResearch, &session_with_inputs(), &settings, None)
            .unwrap()
            .unwrap();
        assert_eq!(request.max_tokens, 123);
    }
}
