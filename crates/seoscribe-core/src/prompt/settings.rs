//! Tunable constants interpolated into every prompt.
//!
//! The volume-tier vocabulary and the readability band are not
//! machine-checkable targets, so they live here rather than in the prompt
//! text. All fields default and can be overridden from the `[prompts]`
//! section of the config file.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::workflow::state::Step;

/// An inclusive numeric range rendered as `min-max` in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub min: u32,
    pub max: u32,
}

impl Band {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Maximum output tokens requested for each generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTokenBudgets {
    pub lsi_research: u32,
    pub content_brief: u32,
    pub draft_article: u32,
    pub refine: u32,
}

impl Default for StepTokenBudgets {
    fn default() -> Self {
        Self {
            lsi_research: 2000,
            content_brief: 1500,
            draft_article: 4096,
            refine: 4096,
        }
    }
}

impl StepTokenBudgets {
    /// Budget for `step`, or `None` for steps that never call the generator.
    pub fn for_step(&self, step: Step) -> Option<u32> {
        match step {
            Step::LsiResearch => Some(self.lsi_research),
            Step::ContentBrief => Some(self.content_brief),
            Step::DraftArticle => Some(self.draft_article),
            Step::Refine => Some(self.refine),
            Step::KeywordIntake | Step::Export => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Labels the provider must use for estimated search volume.
    pub volume_tiers: Vec<String>,
    /// Target Flesch-Kincaid reading-ease band.
    pub reading_ease: Band,
    /// Total article word count.
    pub word_count: Band,
    /// Words per article section.
    pub section_words: Band,
    pub title_tag_max_chars: u32,
    pub meta_description_chars: Band,
    /// How many LSI keywords to request.
    pub lsi_keyword_count: Band,
    pub faq_count: u32,
    pub max_tokens: StepTokenBudgets,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            volume_tiers: ["low", "medium", "high", "very high"]
                .into_iter()
                .map(String::from)
                .collect(),
            reading_ease: Band::new(50, 60),
            word_count: Band::new(800, 2000),
            section_words: Band::new(120, 300),
            title_tag_max_chars: 60,
            meta_description_chars: Band::new(150, 160),
            lsi_keyword_count: Band::new(10, 15),
            faq_count: 5,
            max_tokens: StepTokenBudgets::default(),
        }
    }
}

impl PromptSettings {
    /// The tier vocabulary as a prompt fragment: `low / medium / high`.
    pub fn tier_list(&self) -> String {
        self.volume_tiers.join(" / ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_copywriting_guidelines() {
        let settings = PromptSettings::default();
        assert_eq!(settings.reading_ease.to_string(), "50-60");
        assert_eq!(settings.word_count.to_string(), "800-2000");
        assert_eq!(settings.title_tag_max_chars, 60);
        assert_eq!(settings.tier_list(), "low / medium / high / very high");
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let settings: PromptSettings = toml::from_str(
            r#"
            volume_tiers = ["niche", "mainstream"]

            [reading_ease]
            min = 60
            max = 70

            [max_tokens]
            draft_article = 8000
            "#,
        )
        .unwrap();

        assert_eq!(settings.tier_list(), "niche / mainstream");
        assert_eq!(settings.reading_ease, Band::new(60, 70));
        assert_eq!(settings.word_count, Band::new(800, 2000));
        assert_eq!(settings.max_tokens.draft_article, 8000);
        assert_eq!(settings.max_tokens.lsi_research, 2000);
    }

    #[test]
    fn token_budget_only_for_generation_steps() {
        let budgets = StepTokenBudgets::default();
        for step in Step::ALL {
            assert_eq!(budgets.for_step(step).is_some(), step.requires_generation());
        }
    }
}
