//! Parsing of generated text back into structured session fields.
//!
//! The prompts ask the provider for delimited sections (`---TITLETAG---`
//! and friends) and a pipe table of keywords. Parsing is lenient: a missing
//! section yields an empty string and the caller decides whether that is
//! fatal.

use serde::{Deserialize, Serialize};

use crate::session::{ContentBrief, LsiKeyword};

/// Section delimiters shared by the brief and article output formats.
pub mod delim {
    pub const ANGLE: &str = "---ANGLE---";
    pub const OUTLINE: &str = "---OUTLINE---";
    pub const KEYWORDS: &str = "---KEYWORDS---";
    pub const TITLE_TAG: &str = "---TITLETAG---";
    pub const META_DESC: &str = "---METADESC---";
    pub const ARTICLE_TITLE: &str = "---ARTICLETITLE---";
    pub const ARTICLE_COPY: &str = "---ARTICLECOPY---";
    pub const FAQS: &str = "---FAQS---";
    pub const END: &str = "---END---";
}

/// Return the trimmed text between `start` and the next `end` after it.
///
/// Returns an empty string if either delimiter is missing.
pub fn extract_section(raw: &str, start: &str, end: &str) -> String {
    let Some(begin) = raw.find(start).map(|pos| pos + start.len()) else {
        return String::new();
    };
    match raw[begin..].find(end) {
        Some(len) => raw[begin..begin + len].trim().to_string(),
        None => String::new(),
    }
}

/// Parse the keyword rows of a Markdown pipe table.
///
/// The first column is the keyword, the second the volume tier and the
/// optional third the intent. Header and separator rows are skipped, as are
/// rows with fewer than two non-empty cells.
pub fn parse_lsi_table(raw: &str) -> Vec<LsiKeyword> {
    let mut keywords = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if !line.starts_with('|') {
            continue;
        }

        let cells: Vec<&str> = line
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();

        if cells.len() < 2 || cells[0].is_empty() || cells[1].is_empty() {
            continue;
        }
        if is_separator_row(&cells) || cells[0].eq_ignore_ascii_case("keyword") {
            continue;
        }

        let intent = cells
            .get(2)
            .map(|c| clean_cell(c))
            .filter(|c| !c.is_empty());

        keywords.push(LsiKeyword {
            keyword: clean_cell(cells[0]),
            volume: clean_cell(cells[1]).to_lowercase(),
            intent,
        });
    }

    keywords
}

fn is_separator_row(cells: &[&str]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

/// Strip Markdown emphasis and quotes the provider likes to add.
fn clean_cell(cell: &str) -> String {
    cell.trim_matches(|c: char| c == '*' || c == '"' || c == '`' || c.is_whitespace())
        .to_string()
}

/// Parse a delimited content brief.
pub fn parse_brief(raw: &str) -> ContentBrief {
    ContentBrief {
        angle: extract_section(raw, delim::ANGLE, delim::TITLE_TAG),
        title_tag: extract_section(raw, delim::TITLE_TAG, delim::META_DESC),
        meta_description: extract_section(raw, delim::META_DESC, delim::OUTLINE),
        outline: extract_section(raw, delim::OUTLINE, delim::FAQS),
        faq_suggestions: extract_section(raw, delim::FAQS, delim::END),
    }
}

/// The article broken into its delimited sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSections {
    pub keywords: String,
    pub title_tag: String,
    pub meta_description: String,
    pub article_title: String,
    pub article_copy: String,
    pub faqs: String,
}

/// Parse a delimited article.
///
/// If the provider ignored the format entirely the whole text becomes the
/// article copy so nothing is lost on export.
pub fn parse_article(raw: &str) -> ArticleSections {
    let mut sections = ArticleSections {
        keywords: extract_section(raw, delim::KEYWORDS, delim::TITLE_TAG),
        title_tag: extract_section(raw, delim::TITLE_TAG, delim::META_DESC),
        meta_description: extract_section(raw, delim::META_DESC, delim::ARTICLE_TITLE),
        article_title: extract_section(raw, delim::ARTICLE_TITLE, delim::ARTICLE_COPY),
        article_copy: extract_section(raw, delim::ARTICLE_COPY, delim::FAQS),
        faqs: extract_section(raw, delim::FAQS, delim::END),
    };
    if sections.article_copy.is_empty() && !raw.contains(delim::ARTICLE_COPY) {
        sections.article_copy = raw.trim().to_string();
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_section_between_delimiters() {
        let raw = "---A---\n  hello  \n---B---";
        assert_eq!(extract_section(raw, "---A---", "---B---"), "hello");
    }

    #[test]
    fn extract_section_missing_delimiters_is_empty() {
        assert_eq!(extract_section("no markers", "---A---", "---B---"), "");
        assert_eq!(extract_section("---A--- dangling", "---A---", "---B---"), "");
    }

    #[test]
    fn extract_section_searches_end_after_start() {
        let raw = "---B--- early ---A--- body ---B---";
        assert_eq!(extract_section(raw, "---A---", "---B---"), "body");
    }

    #[test]
    fn lsi_table_rows_are_parsed() {
        let raw = "\
KEYWORD INTENT: commercial

| Keyword | Volume | Intent |
|---|---|---|
| plant-based protein | Medium | informational |
| **vegan snacks** | high | commercial |
| broken row |  |  |

Note: estimates only.";

        let keywords = parse_lsi_table(raw);
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].keyword, "plant-based protein");
        assert_eq!(keywords[0].volume, "medium");
        assert_eq!(keywords[0].intent.as_deref(), Some("informational"));
        assert_eq!(keywords[1].keyword, "vegan snacks");
        assert_eq!(keywords[1].volume, "high");
    }

    #[test]
    fn lsi_table_without_intent_column() {
        let keywords = parse_lsi_table("| keyword | volume |\n| :-- | --: |\n| oat bars | low |");
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].keyword, "oat bars");
        assert!(keywords[0].intent.is_none());
    }

    #[test]
    fn lsi_table_absent_yields_nothing() {
        assert!(parse_lsi_table("Here are some keywords: a, b, c").is_empty());
    }

    #[test]
    fn brief_sections_are_parsed() {
        let raw = "\
---ANGLE---
Informational; readers compare bars.
---TITLETAG---
Best Vegan Protein Bars
---METADESC---
Find the best vegan protein bars.
---OUTLINE---
## Why plant-based protein
### Vegan snacks on the go
---FAQS---
1. Are they healthy?
---END---";

        let brief = parse_brief(raw);
        assert_eq!(brief.angle, "Informational; readers compare bars.");
        assert_eq!(brief.title_tag, "Best Vegan Protein Bars");
        assert_eq!(brief.meta_description, "Find the best vegan protein bars.");
        assert!(brief.outline.starts_with("## Why plant-based protein"));
        assert!(brief.outline.contains("### Vegan snacks on the go"));
        assert_eq!(brief.faq_suggestions, "1. Are they healthy?");
        assert!(brief.missing_field().is_none());
    }

    #[test]
    fn article_sections_are_parsed() {
        let raw = "\
---KEYWORDS---
a, b
---TITLETAG---
Tag
---METADESC---
Meta
---ARTICLETITLE---
# Title
---ARTICLECOPY---
Body text.
---FAQS---
Q1: Why?
A1: Because.
---END---";

        let sections = parse_article(raw);
        assert_eq!(sections.keywords, "a, b");
        assert_eq!(sections.title_tag, "Tag");
        assert_eq!(sections.meta_description, "Meta");
        assert_eq!(sections.article_title, "# Title");
        assert_eq!(sections.article_copy, "Body text.");
        assert_eq!(sections.faqs, "Q1: Why?\nA1: Because.");
    }

    #[test]
    fn unformatted_article_becomes_copy() {
        let sections = parse_article("  # Just an article\n\nWith text.  ");
        assert_eq!(sections.article_copy, "# Just an article\n\nWith text.");
        assert!(sections.title_tag.is_empty());
    }
}
