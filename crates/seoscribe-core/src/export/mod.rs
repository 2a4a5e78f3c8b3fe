//! Export writer: persists a finished session as a Markdown document and a
//! JSON record sharing one file stem.
//!
//! Both files are written to temporary files in the output directory first
//! and only renamed into place once both are complete, so an export never
//! leaves a Markdown file without its JSON counterpart. Renames never
//! replace an existing file.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::parse::{self, ArticleSections};
use crate::presets::RefineInstruction;
use crate::session::{ContentBrief, KeywordInputs, LsiKeyword, RefinementEntry, Session};

/// Longest keyword prefix used in file names.
const MAX_STEM_KEYWORD_CHARS: usize = 30;

/// How many `-N` suffixes to try before giving up on a free file stem.
const MAX_STEM_ATTEMPTS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize export record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session is not ready to export: {missing} is missing")]
    Incomplete { missing: &'static str },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where an export landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Terminal snapshot of a session. Both export files are rendered from the
/// same record, so they always carry the same field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub generated_at: DateTime<Local>,
    pub inputs: KeywordInputs,
    pub lsi_keywords: Vec<LsiKeyword>,
    pub keyword_research_notes: String,
    pub brief: ContentBrief,
    /// The final article split into its delimited sections.
    pub sections: ArticleSections,
    /// The final article exactly as generated.
    pub article_text: String,
    pub refinements: Vec<RefinementEntry>,
}

impl ExportRecord {
    /// Snapshot `session` as of `generated_at`.
    pub fn from_session(
        session: &Session,
        generated_at: DateTime<Local>,
    ) -> Result<Self, ExportError> {
        let inputs = session
            .inputs
            .clone()
            .ok_or(ExportError::Incomplete { missing: "keyword input" })?;
        let lsi = session
            .lsi
            .clone()
            .ok_or(ExportError::Incomplete { missing: "LSI research" })?;
        let brief = session
            .brief
            .clone()
            .ok_or(ExportError::Incomplete { missing: "content brief" })?;
        let article_text = session
            .article
            .clone()
            .ok_or(ExportError::Incomplete { missing: "article" })?;

        Ok(Self {
            generated_at,
            inputs,
            lsi_keywords: lsi.keywords,
            keyword_research_notes: lsi.notes,
            brief,
            sections: parse::parse_article(&article_text),
            article_text,
            refinements: session.refinements.clone(),
        })
    }
}

/// The result of a successful export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub paths: ExportPaths,
    pub record: ExportRecord,
}

/// Writes export pairs into one configured directory.
#[derive(Debug, Clone)]
pub struct ExportWriter {
    output_dir: PathBuf,
}

impl ExportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export `session` stamped with `at`.
    ///
    /// Creates the output directory if needed. On error no export file is
    /// left behind.
    pub fn write(
        &self,
        session: &Session,
        at: DateTime<Local>,
    ) -> Result<ExportOutcome, ExportError> {
        let record = ExportRecord::from_session(session, at)?;
        let markdown = render_markdown(&record);
        let json = serde_json::to_string_pretty(&record)?;

        let dir = &self.output_dir;
        std::fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;

        let stem = file_stem(&record.inputs.primary_keyword, at);
        let mut md_tmp = write_temp(dir, markdown.as_bytes())?;

        // Names are claimed with no-clobber renames, so a concurrent export
        // that lands on the same stem moves this one to the next suffix.
        for attempt in 0..MAX_STEM_ATTEMPTS {
            let paths = self.paths_for(&stem, attempt);
            if paths.markdown.exists() {
                continue;
            }

            let json_tmp = write_temp(dir, json.as_bytes())?;
            match json_tmp.persist_noclobber(&paths.json) {
                Ok(_) => {}
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(ExportError::io(&paths.json, e.error)),
            }

            match md_tmp.persist_noclobber(&paths.markdown) {
                Ok(_) => {
                    info!(
                        markdown = %paths.markdown.display(),
                        json = %paths.json.display(),
                        "article exported"
                    );
                    return Ok(ExportOutcome { paths, record });
                }
                Err(e) => {
                    if let Err(cleanup) = std::fs::remove_file(&paths.json) {
                        warn!(
                            path = %paths.json.display(),
                            error = %cleanup,
                            "failed to remove orphaned JSON export"
                        );
                    }
                    if e.error.kind() != ErrorKind::AlreadyExists {
                        return Err(ExportError::io(&paths.markdown, e.error));
                    }
                    md_tmp = e.file;
                }
            }
        }

        Err(ExportError::io(
            &dir.join(&stem),
            std::io::Error::new(ErrorKind::AlreadyExists, "no free export file name"),
        ))
    }

    /// `<stem>.{md,json}` for the first attempt, `<stem>-N.{md,json}` after.
    fn paths_for(&self, stem: &str, attempt: usize) -> ExportPaths {
        let name = if attempt == 0 {
            stem.to_string()
        } else {
            format!("{stem}-{attempt}")
        };
        ExportPaths {
            markdown: self.output_dir.join(format!("{name}.md")),
            json: self.output_dir.join(format!("{name}.json")),
        }
    }
}

fn write_temp(dir: &Path, contents: &[u8]) -> Result<NamedTempFile, ExportError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ExportError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ExportError::io(tmp.path(), e))?;
    Ok(tmp)
}

/// Make a keyword safe and short enough for a file name.
///
/// Spaces become `_`, slashes `-`, anything else outside
/// `[A-Za-z0-9_-]` is dropped. Falls back to `article`.
pub fn normalize_keyword(keyword: &str) -> String {
    let normalized: String = keyword
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '/' | '\\' => Some('-'),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .take(MAX_STEM_KEYWORD_CHARS)
        .collect();

    if normalized.is_empty() {
        "article".to_string()
    } else {
        normalized
    }
}

/// `<normalized-keyword>_<YYYYmmdd_HHMMSS_mmm>`
pub fn file_stem(keyword: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}",
        normalize_keyword(keyword),
        at.format("%Y%m%d_%H%M%S_%3f")
    )
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Render the human-readable export document.
///
/// Every value in the record appears in the document; only the layout
/// differs from the JSON export.
pub fn render_markdown(record: &ExportRecord) -> String {
    let inputs = &record.inputs;
    let brief = &record.brief;
    let sections = &record.sections;
    let title_tag = if sections.title_tag.is_empty() {
        &brief.title_tag
    } else {
        &sections.title_tag
    };
    let meta_description = if sections.meta_description.is_empty() {
        &brief.meta_description
    } else {
        &sections.meta_description
    };

    let mut md = format!(
        "\
# SEO ARTICLE OUTPUT

**Primary Keyword:** {keyword}
**Generated:** {generated}

---

## INPUTS

**Brand:** {brand}
**Industry:** {industry}
**Target Audience:** {audience}
**Tone:** {tone}
**Additional Notes:** {input_notes}

---

## SEO META DATA

**Title Tag:** {title_tag}

**Meta Description:** {meta_description}

**Keywords Used:** {keywords}

---

## ARTICLE

{title}{copy}

---

## FREQUENTLY ASKED QUESTIONS

{faqs}

---

## KEYWORD RESEARCH NOTES

{notes}

### LSI Keywords

{lsi_table}
---

## CONTENT BRIEF

**Angle:** {angle}

**Proposed Title Tag:** {brief_title_tag}

**Proposed Meta Description:** {brief_meta_description}

### Outline

{outline}

### FAQ Ideas

{faq_suggestions}
",
        keyword = inputs.primary_keyword,
        generated = record.generated_at.format("%d %B %Y, %H:%M"),
        brand = inputs.brand.as_deref().unwrap_or("Not specified"),
        industry = or_na(&inputs.industry),
        audience = or_na(&inputs.audience),
        tone = or_na(&inputs.tone),
        input_notes = or_na(inputs.notes.as_deref().unwrap_or_default()),
        title_tag = or_na(title_tag),
        meta_description = or_na(meta_description),
        keywords = or_na(&sections.keywords),
        title = if sections.article_title.is_empty() {
            String::new()
        } else {
            format!("{}\n\n", sections.article_title)
        },
        copy = sections.article_copy,
        faqs = or_na(&sections.faqs),
        notes = or_na(&record.keyword_research_notes),
        lsi_table = lsi_table(&record.lsi_keywords),
        angle = or_na(&brief.angle),
        brief_title_tag = or_na(&brief.title_tag),
        brief_meta_description = or_na(&brief.meta_description),
        outline = or_na(&brief.outline),
        faq_suggestions = or_na(&brief.faq_suggestions),
    );

    if !record.refinements.is_empty() {
        md.push_str("\n---\n\n## REFINEMENT LOG\n");
        for (n, entry) in record.refinements.iter().enumerate() {
            push_refinement(&mut md, n + 1, entry);
        }
    }

    md.push_str("\n---\n*Generated by seoscribe*\n");
    md
}

fn lsi_table(keywords: &[LsiKeyword]) -> String {
    if keywords.is_empty() {
        return "No keywords extracted.\n".to_string();
    }
    let mut table = String::from("| Keyword | Volume | Intent |\n|---|---|---|\n");
    for kw in keywords {
        table.push_str(&format!(
            "| {} | {} | {} |\n",
            kw.keyword,
            kw.volume,
            kw.intent.as_deref().unwrap_or("")
        ));
    }
    table
}

fn push_refinement(md: &mut String, n: usize, entry: &RefinementEntry) {
    let instruction = match &entry.instruction {
        RefineInstruction::Preset(name) => format!("Preset: {name}"),
        RefineInstruction::Custom(text) => format!("Custom: {text}"),
    };
    md.push_str(&format!(
        "
### {n}. {instruction}

**Directive:** {directive}
**Refined:** {refined_at}

<details><summary>Before</summary>

{previous}

</details>

<details><summary>After</summary>

{result}

</details>
",
        directive = entry.directive,
        refined_at = entry.refined_at.format("%Y-%m-%d %H:%M:%S UTC"),
        previous = entry.previous_text.trim(),
        result = entry.result_text.trim(),
    ));
}
