//! Session data model: one user's in-progress article.
//!
//! A [`Session`] is created when the user starts the workflow and mutated in
//! place by the [`crate::workflow::WorkflowController`] as each step commits.
//! Nothing here is persisted except through [`crate::export`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::export::ExportPaths;
use crate::presets::RefineInstruction;
use crate::workflow::state::{Step, WorkflowState};

pub const DEFAULT_INDUSTRY: &str = "General";
pub const DEFAULT_AUDIENCE: &str = "General audience";
pub const DEFAULT_TONE: &str = "expert, informative, conversational";

fn default_industry() -> String {
    DEFAULT_INDUSTRY.to_string()
}

fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_string()
}

fn default_tone() -> String {
    DEFAULT_TONE.to_string()
}

/// User-supplied parameters collected by the keyword intake step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordInputs {
    /// The keyword the article should rank for.
    pub primary_keyword: String,
    /// Brand or website the article is written for, if any.
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default = "default_industry")]
    pub industry: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    /// Free-text notes carried into the article prompt.
    #[serde(default)]
    pub notes: Option<String>,
}

impl KeywordInputs {
    /// Inputs for `primary_keyword` with every other field defaulted.
    pub fn new(primary_keyword: impl Into<String>) -> Self {
        Self {
            primary_keyword: primary_keyword.into(),
            brand: None,
            industry: default_industry(),
            audience: default_audience(),
            tone: default_tone(),
            notes: None,
        }
    }

    /// Trim every field, turn blank optional fields into `None` and blank
    /// required fields back into their defaults.
    ///
    /// The primary keyword is trimmed but never defaulted; callers must
    /// reject an empty keyword themselves.
    pub fn normalize(self) -> Self {
        fn non_blank(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        fn or_default(value: String, default: fn() -> String) -> String {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                default()
            } else {
                trimmed.to_string()
            }
        }

        Self {
            primary_keyword: self.primary_keyword.trim().to_string(),
            brand: non_blank(self.brand),
            industry: or_default(self.industry, default_industry),
            audience: or_default(self.audience, default_audience),
            tone: or_default(self.tone, default_tone),
            notes: non_blank(self.notes),
        }
    }
}

/// One semantically related keyword with its estimated search-volume tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsiKeyword {
    pub keyword: String,
    /// Volume tier label, e.g. `medium`. The vocabulary is configurable
    /// through [`crate::prompt::PromptSettings::volume_tiers`].
    pub volume: String,
    /// Search intent (`informational`, `commercial`, `both`) when the
    /// provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

/// Output of the LSI research step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsiResearch {
    pub keywords: Vec<LsiKeyword>,
    /// The full research text as generated, kept as research notes.
    pub notes: String,
}

/// Output of the content brief step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBrief {
    /// Search intent and recommended content angle.
    pub angle: String,
    /// Nested heading outline (`##`/`###` lines).
    pub outline: String,
    pub title_tag: String,
    pub meta_description: String,
    /// Questions a real reader would ask, used to seed the FAQ section.
    pub faq_suggestions: String,
}

impl ContentBrief {
    /// Name of the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.outline.trim().is_empty() {
            Some("outline")
        } else if self.title_tag.trim().is_empty() {
            Some("title tag")
        } else if self.meta_description.trim().is_empty() {
            Some("meta description")
        } else {
            None
        }
    }
}

/// One applied refinement: the instruction and the text it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementEntry {
    pub instruction: RefineInstruction,
    /// The instruction text actually sent to the provider.
    pub directive: String,
    /// Article text before this refinement.
    pub previous_text: String,
    /// Article text after this refinement.
    pub result_text: String,
    pub refined_at: DateTime<Utc>,
}

/// One user's complete state across the six-step workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: WorkflowState,
    pub inputs: Option<KeywordInputs>,
    pub lsi: Option<LsiResearch>,
    pub brief: Option<ContentBrief>,
    /// Current article text; replaced by each refinement.
    pub article: Option<String>,
    /// Every refinement applied so far, oldest first.
    pub refinements: Vec<RefinementEntry>,
    pub last_export: Option<ExportPaths>,
}

impl Session {
    /// Start a new session awaiting keyword input.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: WorkflowState::AwaitingKeywordInput,
            inputs: None,
            lsi: None,
            brief: None,
            article: None,
            refinements: Vec::new(),
            last_export: None,
        }
    }

    /// The step whose output the session currently shows.
    pub fn current_step(&self) -> Step {
        self.state.step()
    }

    /// The 1-based index of [`Self::current_step`].
    pub fn step_index(&self) -> u8 {
        self.current_step().index()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_awaits_keyword_input() {
        let session = Session::new();
        assert_eq!(session.state, WorkflowState::AwaitingKeywordInput);
        assert_eq!(session.current_step(), Step::KeywordIntake);
        assert_eq!(session.step_index(), 1);
        assert!(session.inputs.is_none());
        assert!(session.refinements.is_empty());
    }

    #[test]
    fn inputs_deserialize_with_defaults() {
        let inputs: KeywordInputs =
            serde_json::from_str(r#"{"primary_keyword":"vegan protein bars"}"#).unwrap();
        assert_eq!(inputs.primary_keyword, "vegan protein bars");
        assert_eq!(inputs.industry, DEFAULT_INDUSTRY);
        assert_eq!(inputs.audience, DEFAULT_AUDIENCE);
        assert_eq!(inputs.tone, DEFAULT_TONE);
        assert!(inputs.brand.is_none());
        assert!(inputs.notes.is_none());
    }

    #[test]
    fn normalize_trims_and_restores_defaults() {
        let inputs = KeywordInputs {
            primary_keyword: "  trail shoes ".to_string(),
            brand: Some("   ".to_string()),
            industry: " ".to_string(),
            audience: "runners ".to_string(),
            tone: String::new(),
            notes: Some(" mention grip ".to_string()),
        }
        .normalize();

        assert_eq!(inputs.primary_keyword, "trail shoes");
        assert!(inputs.brand.is_none());
        assert_eq!(inputs.industry, DEFAULT_INDUSTRY);
        assert_eq!(inputs.audience, "runners");
        assert_eq!(inputs.tone, DEFAULT_TONE);
        assert_eq!(inputs.notes.as_deref(), Some("mention grip"));
    }

    #[test]
    fn brief_reports_first_missing_field() {
        let mut brief = ContentBrief::default();
        assert_eq!(brief.missing_field(), Some("outline"));
        brief.outline = "## Intro".to_string();
        assert_eq!(brief.missing_field(), Some("title tag"));
        brief.title_tag = "Title".to_string();
        assert_eq!(brief.missing_field(), Some("meta description"));
        brief.meta_description = "Meta".to_string();
        assert_eq!(brief.missing_field(), None);
    }
}
