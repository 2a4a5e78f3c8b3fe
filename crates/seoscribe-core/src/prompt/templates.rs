//! Prompt text for each generation step.
//!
//! Every builder is a pure function of its inputs and [`PromptSettings`];
//! nothing here touches the network or the session.

use crate::parse::delim;
use crate::prompt::settings::PromptSettings;
use crate::session::{ContentBrief, KeywordInputs, LsiResearch};

/// System prompt used for drafting and refining the article.
pub const COPYWRITER_SYSTEM: &str = "You are a world-class SEO copywriter who follows best \
practice guidelines to the letter. Always produce the article in the exact output format \
requested. Never truncate or summarise: write the full article.";

fn brand_line(inputs: &KeywordInputs) -> &str {
    inputs.brand.as_deref().unwrap_or("Not specified")
}

fn semantic_keywords_guide(settings: &PromptSettings) -> String {
    format!(
        "\
SEMANTIC KEYWORD (LSI) GUIDELINES
Goal: raise the page's topical relevance with semantically related keywords.
1. Treat the primary keyword as the focal point.
2. Produce {count} related keywords that establish authority on the subject.
3. Keep every keyword on-topic for the audience and industry.
4. Give each keyword an estimated monthly search-volume tier using ONLY these labels: {tiers}.
5. Tag each keyword's intent as informational, commercial or both.
Commercial keywords are usually short and purchase-focused; informational ones are \
longer, question-like or comparative. Flag low confidence instead of guessing.",
        count = settings.lsi_keyword_count,
        tiers = settings.tier_list(),
    )
}

fn content_research_guide() -> &'static str {
    "\
CONTENT RESEARCH GUIDELINES
1. Work out what the article must cover to answer the search comprehensively.
2. Understand the audience: their needs, questions and search behaviour.
3. Look for angles competitors rarely cover.
4. Keep every section relevant to the primary keyword and the searcher's intent.
5. Use the researched keywords in headings where they fit naturally.
Be genuinely useful above all else and flag low confidence where it exists."
}

fn copywriting_guide(settings: &PromptSettings) -> String {
    format!(
        "\
ARTICLE COPYWRITING GUIDELINES
Readability: aim for a Flesch-Kincaid reading ease of {ease}. If complex terms are \
unavoidable, explain them in a Definitions section at the end.
Voice: write as a subject-matter expert; comprehensive and clearly structured.
Structure: # for the article title, then ## / ### / #### for nested sections. Each level \
goes deeper than the one above it; never use more than four levels.
Length: {words} words in total, {section} words per section.
Keywords: weave the researched keywords into copy and headings naturally, at a natural \
density. No keyword stuffing.
Primary keyword placement: title, first paragraph, at least two subheadings, conclusion.
Title tag: contains the primary keyword, at most {title_max} characters.
Meta description: {meta} characters, contains the primary keyword, compelling to click.
Style: short paragraphs of 2-4 sentences, a hook in the first two sentences, numbers and \
examples where relevant, transitional phrases that keep readers moving, and a conclusion \
with a clear takeaway or call to action. Never make false claims; mark estimates as such.
FAQ: finish with {faqs} frequently asked questions, each with a 2-4 sentence answer.",
        ease = settings.reading_ease,
        words = settings.word_count,
        section = settings.section_words,
        title_max = settings.title_tag_max_chars,
        meta = settings.meta_description_chars,
        faqs = settings.faq_count,
    )
}

fn article_output_format(settings: &PromptSettings) -> String {
    let faq_lines: String = (1..=settings.faq_count)
        .map(|n| format!("Q{n}: [question]\nA{n}: [answer]\n\n"))
        .collect();

    format!(
        "\
OUTPUT FORMAT - use these section delimiters exactly:

{keywords}
[comma-separated list of every keyword used]

{title_tag}
[title tag, at most {title_max} characters, includes the primary keyword]

{meta}
[meta description, {meta_len} characters, includes the primary keyword]

{article_title}
[the H1 title]

{copy}
[the full article body in Markdown using # ## ### #### headings, {words} words]
[end with a Definitions section if complex terms were used]

{faqs}
{faq_lines}{end}",
        keywords = delim::KEYWORDS,
        title_tag = delim::TITLE_TAG,
        meta = delim::META_DESC,
        article_title = delim::ARTICLE_TITLE,
        copy = delim::ARTICLE_COPY,
        faqs = delim::FAQS,
        end = delim::END,
        title_max = settings.title_tag_max_chars,
        meta_len = settings.meta_description_chars,
        words = settings.word_count,
    )
}

/// Render the LSI keywords as the table the brief and article prompts quote.
fn keyword_table(lsi: &LsiResearch) -> String {
    let mut table = String::from("| Keyword | Volume | Intent |\n|---|---|---|\n");
    for kw in &lsi.keywords {
        table.push_str(&format!(
            "| {} | {} | {} |\n",
            kw.keyword,
            kw.volume,
            kw.intent.as_deref().unwrap_or("-")
        ));
    }
    table
}

/// Step 2: ask for semantically related keywords with volume tiers.
pub fn lsi_research(inputs: &KeywordInputs, settings: &PromptSettings) -> String {
    format!(
        "\
{guide}

PRIMARY KEYWORD: \"{keyword}\"
BRAND/WEBSITE: {brand}
INDUSTRY/NICHE: {industry}
TARGET AUDIENCE: {audience}
TONE OF VOICE: {tone}

Following the guidelines above, research the semantic keyword set for this topic.

Reply in exactly this format:

PRIMARY KEYWORD: {keyword}
KEYWORD INTENT: [informational / commercial / both] - [why]
BEST CONTENT ANGLE: [one or two sentences]

| Keyword | Volume | Intent |
|---|---|---|
[{count} rows; Volume must be one of: {tiers}]

TOP 5 KEYWORDS TO WEAVE INTO THE ARTICLE:
1. [keyword] - [why it matters]
2. [keyword] - [why]
3. [keyword] - [why]
4. [keyword] - [why]
5. [keyword] - [why]

Volume tiers are indicative estimates, not measured data.",
        guide = semantic_keywords_guide(settings),
        keyword = inputs.primary_keyword,
        brand = brand_line(inputs),
        industry = inputs.industry,
        audience = inputs.audience,
        tone = inputs.tone,
        count = settings.lsi_keyword_count,
        tiers = settings.tier_list(),
    )
}

/// Step 3: ask for an angle, outline, title tag and meta description.
pub fn content_brief(
    inputs: &KeywordInputs,
    lsi: &LsiResearch,
    settings: &PromptSettings,
) -> String {
    format!(
        "\
{guide}

PRIMARY KEYWORD: \"{keyword}\"
BRAND/WEBSITE: {brand}
INDUSTRY: {industry}
TARGET AUDIENCE: {audience}

RESEARCHED KEYWORDS:
{table}
KEYWORD RESEARCH NOTES:
{notes}

Using the guidelines above, write a concise article brief. Work the researched keywords \
into the outline headings and notes.

Reply in exactly this format:

{angle}
SEARCH INTENT: [informational / commercial / navigational / transactional]
USER PROBLEM: [what the searcher is trying to solve]
CONTENT ANGLE: [the angle this article takes]
TARGET WORD COUNT: [a number within {words}]

{title_tag}
[title tag, at most {title_max} characters, includes the primary keyword]

{meta}
[meta description, {meta_len} characters, includes the primary keyword]

{outline}
# [H1 title containing the primary keyword]
## [H2 heading] - [what it covers, which keywords it uses]
### [H3 sub-heading where useful]
## [further H2 headings]
## Frequently Asked Questions
## [Definitions, if complex terms are expected]

{faqs}
[{faq_count} numbered questions a real reader would ask]
{end}",
        guide = content_research_guide(),
        keyword = inputs.primary_keyword,
        brand = brand_line(inputs),
        industry = inputs.industry,
        audience = inputs.audience,
        table = keyword_table(lsi),
        notes = lsi.notes.trim(),
        angle = delim::ANGLE,
        title_tag = delim::TITLE_TAG,
        meta = delim::META_DESC,
        outline = delim::OUTLINE,
        faqs = delim::FAQS,
        end = delim::END,
        words = settings.word_count,
        title_max = settings.title_tag_max_chars,
        meta_len = settings.meta_description_chars,
        faq_count = settings.faq_count,
    )
}

/// Step 4: ask for the full delimited article.
pub fn draft_article(
    inputs: &KeywordInputs,
    lsi: &LsiResearch,
    brief: &ContentBrief,
    settings: &PromptSettings,
) -> String {
    format!(
        "\
{guide}

Write a complete, publish-ready SEO article that follows every guideline above.

INPUTS:
- Primary keyword: \"{keyword}\"
- Industry/niche: {industry}
- Target audience: {audience}
- Tone of voice: {tone}
- Brand/website: {brand}
- Notes from the user: {notes}

RESEARCHED KEYWORDS:
{table}
BRIEF:
Angle: {angle}
Title tag: {title_tag}
Meta description: {meta_description}
Outline:
{outline}
FAQ ideas:
{faq_ideas}

CHECKLIST:
- Reading ease {ease} (short sentences, plain language)
- {words} words in total, {section} words per section
- Nested headings that follow the outline
- Primary keyword in the title, first paragraph, two or more subheadings and the conclusion
- Researched keywords used naturally, no stuffing
- {faq_count} FAQs with full answers appended after the article

{format}",
        guide = copywriting_guide(settings),
        keyword = inputs.primary_keyword,
        industry = inputs.industry,
        audience = inputs.audience,
        tone = inputs.tone,
        brand = brand_line(inputs),
        notes = inputs.notes.as_deref().unwrap_or("None"),
        table = keyword_table(lsi),
        angle = brief.angle,
        title_tag = brief.title_tag,
        meta_description = brief.meta_description,
        outline = brief.outline,
        faq_ideas = if brief.faq_suggestions.is_empty() {
            "None"
        } else {
            brief.faq_suggestions.as_str()
        },
        ease = settings.reading_ease,
        words = settings.word_count,
        section = settings.section_words,
        faq_count = settings.faq_count,
        format = article_output_format(settings),
    )
}

/// Step 5: ask for the complete revised article, not a diff.
pub fn refine(
    inputs: &KeywordInputs,
    article: &str,
    directive: &str,
    settings: &PromptSettings,
) -> String {
    format!(
        "\
Here is the current SEO article:

{article}

REFINEMENT REQUEST: {directive}

Apply only the requested refinement and keep every SEO guideline intact:
- Primary keyword: \"{keyword}\"
- Keep the exact output format and every section delimiter ({first} ... {end})
- Keep reading ease at {ease}
- Keep the total length within {words} words
- Keep the FAQ section

Return the COMPLETE revised article in the same format. Do not return only the changed \
parts, a summary or a diff.",
        article = article.trim(),
        directive = directive,
        keyword = inputs.primary_keyword,
        first = delim::KEYWORDS,
        end = delim::END,
        ease = settings.reading_ease,
        words = settings.word_count,
    )
}
