//! Slide-by-slide blueprint planning over a content summary.
//!
//! The planner turns a [`ContentSummary`] into an ordered list of
//! [`SlideBlueprint`]s: it asks the text backend for a JSON array, filters
//! out unusable entries, renumbers the survivors into a contiguous 1..N
//! sequence, and runs the layout optimizer over the result. Parse failures
//! degrade to a synthesized deck; provider failures propagate for the
//! orchestrator's stage retry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::providers::{ProviderError, TextGenerator, TextRequest};
use crate::summarizer::{ContentSummary, OutlineSection, estimate_slide_count};
use crate::utils::json_slice::{self, ParseError};

/// Sampling temperature for planning calls.
const PLAN_TEMPERATURE: f32 = 0.4;
/// Output token budget for planning calls.
const PLAN_MAX_TOKENS: u32 = 8192;
/// Token estimate assigned when the backend doesn't provide one.
const DEFAULT_SLIDE_TOKENS: u32 = 200;
/// A single text line longer than this reads as a quotation.
const QUOTE_LINE_CHARS: usize = 50;
/// Characters of joined slide text folded into synthesized image prompts.
const IMAGE_PROMPT_EXCERPT: usize = 200;
/// Style suffix appended to every synthesized image prompt.
const IMAGE_PROMPT_STYLE: &str = "modern, clean, business presentation style";

// ── Data model ─────────────────────────────────────────────────────────

/// Visual arrangement of one slide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideLayout {
    Title,
    #[default]
    Content,
    TwoColumn,
    ImageFocus,
    Quote,
    Comparison,
}

impl SlideLayout {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "title" => Some(SlideLayout::Title),
            "content" => Some(SlideLayout::Content),
            "two-column" => Some(SlideLayout::TwoColumn),
            "image-focus" => Some(SlideLayout::ImageFocus),
            "quote" => Some(SlideLayout::Quote),
            "comparison" => Some(SlideLayout::Comparison),
            _ => None,
        }
    }
}

impl fmt::Display for SlideLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideLayout::Title => write!(f, "title"),
            SlideLayout::Content => write!(f, "content"),
            SlideLayout::TwoColumn => write!(f, "two-column"),
            SlideLayout::ImageFocus => write!(f, "image-focus"),
            SlideLayout::Quote => write!(f, "quote"),
            SlideLayout::Comparison => write!(f, "comparison"),
        }
    }
}

/// Body content of one slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideContent {
    /// Ordered text lines (bullets or sentences).
    #[serde(default)]
    pub text: Vec<String>,
    /// Image descriptions or references.
    #[serde(default)]
    pub images: Vec<String>,
    /// Table fragments.
    #[serde(default)]
    pub tables: Vec<String>,
    /// Code listings.
    #[serde(default)]
    pub code_blocks: Vec<String>,
}

/// The structured description of one output slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideBlueprint {
    /// 1-based position, contiguous across the deck.
    pub slide_number: usize,
    pub title: String,
    pub layout: SlideLayout,
    pub content: SlideContent,
    /// Speaker notes.
    #[serde(default)]
    pub notes: String,
    /// Prompt for the image synthesis stage, when the slide wants one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    pub estimated_tokens: u32,
}

// ── Planner ────────────────────────────────────────────────────────────

/// Derives slide blueprints from a [`ContentSummary`].
pub struct Planner {
    provider: Arc<dyn TextGenerator>,
}

impl Planner {
    /// Create a planner over the given text backend.
    pub fn new(provider: Arc<dyn TextGenerator>) -> Self {
        Self { provider }
    }

    /// Plan the deck.
    ///
    /// Both the parsed and the fallback path end with renumbering and
    /// [`optimize_layout`], so every returned deck satisfies the layout
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] only for backend failures.
    pub async fn plan(
        &self,
        summary: &ContentSummary,
        config: &PipelineConfig,
    ) -> Result<Vec<SlideBlueprint>, ProviderError> {
        let target = estimate_slide_count(summary, config.length);
        let request = TextRequest {
            prompt: plan_prompt(summary, target),
            system: Some(
                "You are a presentation designer. Respond with a single JSON array and \
                 nothing else."
                    .into(),
            ),
            temperature: PLAN_TEMPERATURE,
            max_tokens: PLAN_MAX_TOKENS,
        };

        let response = self.provider.generate(request).await?;

        let mut blueprints = match parse_blueprints(&response.text) {
            Ok(parsed) if !parsed.is_empty() => parsed,
            Ok(_) => {
                tracing::warn!("plan response carried no usable slides, synthesizing deck");
                fallback_blueprints(summary, target)
            }
            Err(err) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %err,
                    "plan response unusable, synthesizing deck",
                );
                fallback_blueprints(summary, target)
            }
        };

        renumber(&mut blueprints);
        optimize_layout(&mut blueprints);
        Ok(blueprints)
    }
}

fn plan_prompt(summary: &ContentSummary, target: usize) -> String {
    let mut outline_text = String::new();
    flatten_outline(&summary.outline, 0, &mut outline_text);

    format!(
        "Design a presentation of exactly {target} slides.\n\n\
         Topics: {topics}\n\
         Key points: {points}\n\
         Audience level: {complexity:?}\n\
         Keywords: {keywords}\n\
         Outline:\n{outline}\n\
         Respond with a JSON array; each element must be an object with keys \
         \"slideNumber\" (integer), \"title\", \"layout\" (one of \"title\", \
         \"content\", \"two-column\", \"image-focus\", \"quote\", \"comparison\"), \
         \"content\" ({{\"text\": [..], \"images\": [..], \"tables\": [..], \
         \"codeBlocks\": [..]}}), \"notes\", optional \"imagePrompt\", and \
         \"estimatedTokens\". Use \"image-focus\" for visual material, \
         \"two-column\" for comparisons or tabular data, and \"quote\" for a \
         single emphatic statement.",
        topics = summary.main_topics.join(", "),
        points = summary.key_points.join("; "),
        complexity = summary.complexity,
        keywords = summary.keywords.join(", "),
        outline = outline_text,
    )
}

/// Render the outline tree as indented text, two spaces per nesting level.
fn flatten_outline(sections: &[OutlineSection], depth: usize, out: &mut String) {
    for section in sections {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("- {} (level {})\n", section.title, section.level));
        if !section.content.is_empty() {
            out.push_str(&"  ".repeat(depth + 1));
            out.push_str(section.content.as_str());
            out.push('\n');
        }
        flatten_outline(&section.subsections, depth + 1, out);
    }
}

// ── Response parsing ───────────────────────────────────────────────────

/// Locate the first JSON array in a backend response and coerce its
/// entries. Entries lacking a title or a numeric slide number are dropped;
/// everything else degrades field-by-field.
pub fn parse_blueprints(response: &str) -> Result<Vec<SlideBlueprint>, ParseError> {
    let raw = json_slice::extract_array(response).ok_or(ParseError::NoJsonArray)?;
    let value: Value = serde_json::from_str(raw)?;
    let Some(items) = value.as_array() else {
        return Ok(Vec::new());
    };

    let blueprints = items
        .iter()
        .filter_map(|item| {
            let title = item["title"].as_str()?.trim();
            if title.is_empty() {
                return None;
            }
            let slide_number = item["slideNumber"].as_u64()? as usize;

            let layout = item["layout"]
                .as_str()
                .and_then(SlideLayout::from_tag)
                .unwrap_or_default();

            let content = SlideContent {
                text: string_list(&item["content"]["text"]),
                images: string_list(&item["content"]["images"]),
                tables: string_list(&item["content"]["tables"]),
                code_blocks: string_list(&item["content"]["codeBlocks"]),
            };

            Some(SlideBlueprint {
                slide_number,
                title: title.to_string(),
                layout,
                content,
                notes: item["notes"].as_str().unwrap_or_default().to_string(),
                image_prompt: item["imagePrompt"].as_str().map(str::to_string),
                estimated_tokens: item["estimatedTokens"]
                    .as_u64()
                    .map(|n| n as u32)
                    .unwrap_or(DEFAULT_SLIDE_TOKENS),
            })
        })
        .collect();

    Ok(blueprints)
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ── Fallback ───────────────────────────────────────────────────────────

/// Synthesize a title slide plus `target - 1` generic content slides.
#[must_use]
pub fn fallback_blueprints(summary: &ContentSummary, target: usize) -> Vec<SlideBlueprint> {
    let deck_title = summary
        .main_topics
        .first()
        .cloned()
        .unwrap_or_else(|| "Presentation".to_string());

    let mut blueprints = vec![SlideBlueprint {
        slide_number: 1,
        title: deck_title,
        layout: SlideLayout::Title,
        content: SlideContent::default(),
        notes: String::new(),
        image_prompt: None,
        estimated_tokens: DEFAULT_SLIDE_TOKENS,
    }];

    for position in 1..target {
        let title = summary
            .key_points
            .get((position - 1) % summary.key_points.len().max(1))
            .cloned()
            .unwrap_or_else(|| format!("Topic {position}"));

        blueprints.push(SlideBlueprint {
            slide_number: position + 1,
            title,
            layout: SlideLayout::Content,
            content: SlideContent {
                text: vec!["Content to be elaborated during review".to_string()],
                ..SlideContent::default()
            },
            notes: String::new(),
            image_prompt: None,
            estimated_tokens: DEFAULT_SLIDE_TOKENS,
        });
    }

    blueprints
}

fn renumber(blueprints: &mut [SlideBlueprint]) {
    for (position, blueprint) in blueprints.iter_mut().enumerate() {
        blueprint.slide_number = position + 1;
    }
}

// ── Layout optimization ────────────────────────────────────────────────

/// Normalize layouts after planning, in order:
///
/// 1. The first slide is forced to `Title`.
/// 2. The last slide is forced to `Content`, titled "Summary" if untitled.
/// 3. Every later slide still `Content` — including the one just forced —
///    gets the structure heuristic. This deliberately runs after step 2
///    and may re-assign the last slide.
/// 4. `ImageFocus` slides without an image prompt get a synthesized one.
pub fn optimize_layout(blueprints: &mut [SlideBlueprint]) {
    let Some(first) = blueprints.first_mut() else {
        return;
    };
    first.layout = SlideLayout::Title;

    let len = blueprints.len();
    if len > 1 {
        let last = &mut blueprints[len - 1];
        last.layout = SlideLayout::Content;
        if last.title.trim().is_empty() {
            last.title = "Summary".to_string();
        }
    }

    for blueprint in blueprints.iter_mut().skip(1) {
        if blueprint.layout == SlideLayout::Content {
            blueprint.layout = suggest_layout(&blueprint.content);
        }
    }

    for blueprint in blueprints.iter_mut() {
        if blueprint.layout == SlideLayout::ImageFocus && blueprint.image_prompt.is_none() {
            blueprint.image_prompt = Some(synthesize_image_prompt(blueprint));
        }
    }
}

/// Pick a layout from slide structure: visuals first, then tabular or
/// paired content, then a lone long line as a quotation.
fn suggest_layout(content: &SlideContent) -> SlideLayout {
    let lines = content.text.len();
    if !content.images.is_empty() && lines <= 2 {
        SlideLayout::ImageFocus
    } else if !content.tables.is_empty() || lines == 2 {
        SlideLayout::TwoColumn
    } else if lines == 1 && content.text[0].chars().count() > QUOTE_LINE_CHARS {
        SlideLayout::Quote
    } else {
        SlideLayout::Content
    }
}

fn synthesize_image_prompt(blueprint: &SlideBlueprint) -> String {
    let joined = blueprint.content.text.join(" ");
    let excerpt: String = joined.chars().take(IMAGE_PROMPT_EXCERPT).collect();
    format!("{}. {}. {IMAGE_PROMPT_STYLE}", blueprint.title, excerpt)
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LengthBucket;
    use crate::providers::ScriptedTextProvider;
    use crate::summarizer::Complexity;

    fn summary() -> ContentSummary {
        ContentSummary {
            main_topics: vec!["Storage engines".into()],
            key_points: vec!["Write paths".into(), "Compaction".into()],
            suggested_slide_count: 12,
            estimated_duration_minutes: 18,
            complexity: Complexity::Intermediate,
            keywords: vec!["lsm".into()],
            outline: vec![OutlineSection {
                title: "Internals".into(),
                level: 1,
                content: "how writes land".into(),
                subsections: vec![OutlineSection {
                    title: "WAL".into(),
                    level: 2,
                    content: String::new(),
                    subsections: vec![],
                }],
            }],
        }
    }

    fn slide(number: usize, layout: SlideLayout, text: &[&str]) -> SlideBlueprint {
        SlideBlueprint {
            slide_number: number,
            title: format!("Slide {number}"),
            layout,
            content: SlideContent {
                text: text.iter().map(|s| s.to_string()).collect(),
                ..SlideContent::default()
            },
            notes: String::new(),
            image_prompt: None,
            estimated_tokens: DEFAULT_SLIDE_TOKENS,
        }
    }

    #[test]
    fn parse_filters_unusable_entries() {
        let response = r#"[
            {"slideNumber": 1, "title": "Keep", "layout": "content"},
            {"title": "No number"},
            {"slideNumber": 3},
            {"slideNumber": 4, "title": "   "},
            {"slideNumber": 5, "title": "Also keep", "layout": "mystery",
             "content": {"text": ["a"], "images": [], "tables": [], "codeBlocks": []},
             "estimatedTokens": 150}
        ]"#;
        let blueprints = parse_blueprints(response).unwrap();
        assert_eq!(blueprints.len(), 2);
        assert_eq!(blueprints[0].title, "Keep");
        // Unknown layout tags coerce to Content.
        assert_eq!(blueprints[1].layout, SlideLayout::Content);
        assert_eq!(blueprints[1].estimated_tokens, 150);
        assert_eq!(blueprints[0].estimated_tokens, DEFAULT_SLIDE_TOKENS);
    }

    #[test]
    fn fallback_builds_title_plus_content() {
        let blueprints = fallback_blueprints(&summary(), 5);
        assert_eq!(blueprints.len(), 5);
        assert_eq!(blueprints[0].layout, SlideLayout::Title);
        assert_eq!(blueprints[0].title, "Storage engines");
        assert!(blueprints[1..].iter().all(|b| b.layout == SlideLayout::Content));
        // Numbers are contiguous from 1.
        for (i, blueprint) in blueprints.iter().enumerate() {
            assert_eq!(blueprint.slide_number, i + 1);
        }
    }

    #[test]
    fn optimize_forces_first_title_and_last_not_title() {
        let mut blueprints = vec![
            slide(1, SlideLayout::Quote, &["line"]),
            slide(2, SlideLayout::Content, &["a", "b", "c"]),
            slide(3, SlideLayout::Title, &["a", "b", "c"]),
        ];
        optimize_layout(&mut blueprints);
        assert_eq!(blueprints[0].layout, SlideLayout::Title);
        assert_ne!(blueprints[2].layout, SlideLayout::Title);
    }

    #[test]
    fn optimize_titles_untitled_last_slide_summary() {
        let mut blueprints = vec![slide(1, SlideLayout::Title, &[]), {
            let mut s = slide(2, SlideLayout::ImageFocus, &["a", "b", "c"]);
            s.title = String::new();
            s
        }];
        optimize_layout(&mut blueprints);
        assert_eq!(blueprints[1].title, "Summary");
        // Three text lines and no structure: the heuristic keeps Content.
        assert_eq!(blueprints[1].layout, SlideLayout::Content);
    }

    #[test]
    fn heuristic_assigns_image_focus() {
        let mut blueprints = vec![slide(1, SlideLayout::Title, &[]), {
            let mut s = slide(2, SlideLayout::Content, &["caption"]);
            s.content.images = vec!["diagram".into()];
            s
        }, slide(3, SlideLayout::Content, &["a", "b", "c"])];
        optimize_layout(&mut blueprints);
        assert_eq!(blueprints[1].layout, SlideLayout::ImageFocus);
        // And step 4 synthesized a prompt for it.
        let prompt = blueprints[1].image_prompt.as_deref().unwrap();
        assert!(prompt.contains("Slide 2"));
        assert!(prompt.ends_with(IMAGE_PROMPT_STYLE));
    }

    #[test]
    fn heuristic_assigns_two_column_and_quote() {
        let long_line = "a".repeat(QUOTE_LINE_CHARS + 1);
        let mut blueprints = vec![
            slide(1, SlideLayout::Title, &[]),
            slide(2, SlideLayout::Content, &["left", "right"]),
            slide(3, SlideLayout::Content, &[long_line.as_str()]),
            slide(4, SlideLayout::Content, &["a", "b", "c"]),
        ];
        optimize_layout(&mut blueprints);
        assert_eq!(blueprints[1].layout, SlideLayout::TwoColumn);
        assert_eq!(blueprints[2].layout, SlideLayout::Quote);
        assert_eq!(blueprints[3].layout, SlideLayout::Content);
    }

    #[test]
    fn short_quote_stays_content() {
        let mut blueprints = vec![
            slide(1, SlideLayout::Title, &[]),
            slide(2, SlideLayout::Content, &["short line"]),
            slide(3, SlideLayout::Content, &["a", "b", "c"]),
        ];
        optimize_layout(&mut blueprints);
        assert_eq!(blueprints[1].layout, SlideLayout::Content);
    }

    #[tokio::test]
    async fn plan_renumbers_parsed_slides() {
        let provider = Arc::new(ScriptedTextProvider::new([r#"[
            {"slideNumber": 10, "title": "Opening", "layout": "title"},
            {"slideNumber": 20, "title": "Middle", "layout": "content",
             "content": {"text": ["a", "b", "c"]}},
            {"slideNumber": 30, "title": "Close", "layout": "content",
             "content": {"text": ["a", "b", "c"]}}
        ]"#]));
        let planner = Planner::new(provider);
        let config = PipelineConfig::default();
        let blueprints = planner.plan(&summary(), &config).await.unwrap();

        assert_eq!(blueprints.len(), 3);
        for (i, blueprint) in blueprints.iter().enumerate() {
            assert_eq!(blueprint.slide_number, i + 1);
        }
        assert_eq!(blueprints[0].layout, SlideLayout::Title);
    }

    #[tokio::test]
    async fn plan_falls_back_on_prose() {
        let provider = Arc::new(ScriptedTextProvider::new(["I cannot plan this."]));
        let planner = Planner::new(provider);
        let config = PipelineConfig::builder().length(LengthBucket::Short).build();
        let blueprints = planner.plan(&summary(), &config).await.unwrap();

        // suggested 12, short bucket: clamp(floor(12 * 0.7), 5, 10) = 8.
        assert_eq!(blueprints.len(), 8);
        assert_eq!(blueprints[0].layout, SlideLayout::Title);
        assert_ne!(blueprints[7].layout, SlideLayout::Title);
    }

    #[test]
    fn outline_flattening_indents_by_level() {
        let mut out = String::new();
        flatten_outline(&summary().outline, 0, &mut out);
        assert!(out.contains("- Internals (level 1)"));
        assert!(out.contains("  - WAL (level 2)"));
    }
}
