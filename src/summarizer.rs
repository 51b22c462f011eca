//! Retrieval-backed content summarization with a deterministic fallback.
//!
//! The summarizer concatenates the indexed chunks into a bounded corpus,
//! asks the text backend for a fixed JSON shape, and coerces whatever comes
//! back field-by-field. Parse failures never surface: the heuristic
//! fallback derives a usable summary from the chunks alone. Provider
//! failures do surface — stage-level retries live in the orchestrator.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::LengthBucket;
use crate::index::{RetrievalIndex, tokenize};
use crate::providers::{ProviderError, TextGenerator, TextRequest};
use crate::utils::json_slice::{self, ParseError};

/// Character budget for the concatenated chunk corpus.
const CORPUS_BUDGET: usize = 15_000;
/// Marker appended when the corpus is clipped.
const TRUNCATION_MARKER: &str = "\n…[content truncated]";
/// Sampling temperature for summarization calls.
const SUMMARY_TEMPERATURE: f32 = 0.3;
/// Output token budget for summarization calls.
const SUMMARY_MAX_TOKENS: u32 = 4096;
/// Words per slide assumed by the fallback slide-count heuristic.
const WORDS_PER_SLIDE: usize = 200;
/// Minimum keyword length, in characters, for the fallback extractor.
const KEYWORD_MIN_CHARS: usize = 4;
/// Keywords kept by the fallback extractor.
const KEYWORD_LIMIT: usize = 10;

// ── Data model ─────────────────────────────────────────────────────────

/// Audience complexity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Complexity {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "beginner" => Some(Complexity::Beginner),
            "intermediate" => Some(Complexity::Intermediate),
            "advanced" => Some(Complexity::Advanced),
            _ => None,
        }
    }
}

/// One node of the document outline. Levels start at 1; the tree is
/// acyclic by construction (owned children).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSection {
    pub title: String,
    pub level: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub subsections: Vec<OutlineSection>,
}

/// Structured summary of the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub main_topics: Vec<String>,
    pub key_points: Vec<String>,
    pub suggested_slide_count: usize,
    /// Estimated presentation duration in minutes.
    #[serde(rename = "estimatedDuration")]
    pub estimated_duration_minutes: u32,
    pub complexity: Complexity,
    pub keywords: Vec<String>,
    pub outline: Vec<OutlineSection>,
}

// ── Summarizer ─────────────────────────────────────────────────────────

/// Derives a [`ContentSummary`] from a built [`RetrievalIndex`].
pub struct Summarizer {
    provider: Arc<dyn TextGenerator>,
}

impl Summarizer {
    /// Create a summarizer over the given text backend.
    pub fn new(provider: Arc<dyn TextGenerator>) -> Self {
        Self { provider }
    }

    /// Summarize the indexed document.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] only for backend failures. Unparseable
    /// responses are absorbed by the heuristic fallback.
    pub async fn summarize(&self, index: &RetrievalIndex) -> Result<ContentSummary, ProviderError> {
        let corpus = build_corpus(index);
        let request = TextRequest {
            prompt: summary_prompt(&corpus),
            system: Some(
                "You are a presentation analyst. Respond with a single JSON object and \
                 nothing else."
                    .into(),
            ),
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_MAX_TOKENS,
        };

        let response = self.provider.generate(request).await?;

        match parse_summary(&response.text) {
            Ok(summary) => Ok(summary),
            Err(err) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %err,
                    "summary response unusable, deriving heuristic summary",
                );
                Ok(fallback_summary(index))
            }
        }
    }
}

/// Concatenate all chunk contents in order, clipped to the corpus budget.
#[must_use]
pub fn build_corpus(index: &RetrievalIndex) -> String {
    let joined = index
        .chunks()
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if joined.chars().count() <= CORPUS_BUDGET {
        return joined;
    }

    let clipped: String = joined.chars().take(CORPUS_BUDGET).collect();
    format!("{clipped}{TRUNCATION_MARKER}")
}

fn summary_prompt(corpus: &str) -> String {
    format!(
        "Analyze the following document and produce a JSON object with exactly these \
         keys:\n\
         - \"mainTopics\": array of the document's principal topics\n\
         - \"keyPoints\": array of the points a presentation must cover\n\
         - \"suggestedSlideCount\": integer\n\
         - \"estimatedDuration\": integer, minutes of speaking time\n\
         - \"complexity\": one of \"beginner\", \"intermediate\", \"advanced\"\n\
         - \"keywords\": array of salient terms\n\
         - \"outline\": array of sections, each {{\"title\", \"level\" (>= 1), \
         \"content\", \"subsections\"}} where subsections nest recursively\n\n\
         Document:\n{corpus}",
    )
}

// ── Response parsing ───────────────────────────────────────────────────

/// Locate and coerce the first JSON object in a backend response.
///
/// Missing or malformed fields degrade to safe defaults; only the absence
/// of a parseable object at all is an error.
pub fn parse_summary(response: &str) -> Result<ContentSummary, ParseError> {
    let raw = json_slice::extract_object(response).ok_or(ParseError::NoJsonObject)?;
    let value: Value = serde_json::from_str(raw)?;

    let main_topics = string_list(&value["mainTopics"]);
    let key_points = string_list(&value["keyPoints"]);
    let keywords = string_list(&value["keywords"]);

    let suggested_slide_count = value["suggestedSlideCount"]
        .as_u64()
        .map(|n| n as usize)
        .unwrap_or(10)
        .clamp(5, 25);

    let estimated_duration_minutes = value["estimatedDuration"]
        .as_u64()
        .map(|n| n as u32)
        .unwrap_or_else(|| duration_for(suggested_slide_count));

    let complexity = value["complexity"]
        .as_str()
        .and_then(Complexity::from_tag)
        .unwrap_or_default();

    let outline = outline_sections(&value["outline"]);

    Ok(ContentSummary {
        main_topics,
        key_points,
        suggested_slide_count,
        estimated_duration_minutes,
        complexity,
        keywords,
        outline,
    })
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

/// Recursively validate outline entries, discarding any whose title or
/// numeric level is absent. Levels below 1 are lifted to 1.
fn outline_sections(value: &Value) -> Vec<OutlineSection> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let title = item["title"].as_str()?.to_string();
            let level = item["level"].as_u64()?.max(1) as u32;
            Some(OutlineSection {
                title,
                level,
                content: item["content"].as_str().unwrap_or_default().to_string(),
                subsections: outline_sections(&item["subsections"]),
            })
        })
        .collect()
}

// ── Fallback ───────────────────────────────────────────────────────────

fn duration_for(slide_count: usize) -> u32 {
    (slide_count as f64 * 1.5).ceil() as u32
}

/// Derive a summary from the chunks alone, with no backend involved.
#[must_use]
pub fn fallback_summary(index: &RetrievalIndex) -> ContentSummary {
    let mut headers: Vec<String> = Vec::new();
    for chunk in index.chunks() {
        for header in &chunk.metadata.headers {
            if !headers.contains(header) {
                headers.push(header.clone());
            }
        }
    }

    let main_topics: Vec<String> = if headers.is_empty() {
        vec!["Overview".to_string()]
    } else {
        headers.iter().take(6).cloned().collect()
    };
    let key_points: Vec<String> = headers.iter().take(12).cloned().collect();

    let total_words: usize = index
        .chunks()
        .iter()
        .map(|chunk| chunk.content.split_whitespace().count())
        .sum();
    let suggested_slide_count = total_words.div_ceil(WORDS_PER_SLIDE).clamp(5, 25);

    let outline = headers
        .iter()
        .map(|title| OutlineSection {
            title: title.clone(),
            level: 1,
            content: String::new(),
            subsections: Vec::new(),
        })
        .collect();

    ContentSummary {
        main_topics,
        key_points,
        suggested_slide_count,
        estimated_duration_minutes: duration_for(suggested_slide_count),
        complexity: Complexity::Intermediate,
        keywords: frequent_keywords(index),
        outline,
    }
}

/// The most frequent tokens of at least four characters across all chunks,
/// Latin and non-Latin scripts alike. Ties break alphabetically so the
/// result is deterministic.
fn frequent_keywords(index: &RetrievalIndex) -> Vec<String> {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for chunk in index.chunks() {
        for token in tokenize(&chunk.content) {
            if token.chars().count() >= KEYWORD_MIN_CHARS {
                *counts.entry(token).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(KEYWORD_LIMIT)
        .map(|(token, _)| token)
        .collect()
}

// ── Slide-count estimation ─────────────────────────────────────────────

/// Scale a summary's suggested slide count to the configured deck length.
#[must_use]
pub fn estimate_slide_count(summary: &ContentSummary, length: LengthBucket) -> usize {
    let base = summary.suggested_slide_count;
    match length {
        LengthBucket::Short => ((base as f64 * 0.7).floor() as usize).clamp(5, 10),
        LengthBucket::Medium => base.clamp(10, 15),
        LengthBucket::Long => ((base as f64 * 1.3).floor() as usize).clamp(15, 25),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunker;
    use crate::providers::ScriptedTextProvider;

    fn index_for(text: &str) -> RetrievalIndex {
        RetrievalIndex::build(Chunker::new(20, 0.0).unwrap().chunk(text))
    }

    fn summary_with_count(count: usize) -> ContentSummary {
        ContentSummary {
            main_topics: vec![],
            key_points: vec![],
            suggested_slide_count: count,
            estimated_duration_minutes: 0,
            complexity: Complexity::Intermediate,
            keywords: vec![],
            outline: vec![],
        }
    }

    #[test]
    fn parse_accepts_wrapped_json() {
        let response = r#"Here you go:
{"mainTopics": ["Rust"], "keyPoints": ["ownership"], "suggestedSlideCount": 12,
 "estimatedDuration": 18, "complexity": "advanced", "keywords": ["borrow"],
 "outline": [{"title": "Intro", "level": 1, "content": "why rust",
              "subsections": [{"title": "History", "level": 2}]}]}"#;
        let summary = parse_summary(response).unwrap();
        assert_eq!(summary.main_topics, vec!["Rust"]);
        assert_eq!(summary.suggested_slide_count, 12);
        assert_eq!(summary.complexity, Complexity::Advanced);
        assert_eq!(summary.outline[0].subsections[0].title, "History");
    }

    #[test]
    fn parse_defaults_missing_fields() {
        let summary = parse_summary(r#"{"mainTopics": ["x"]}"#).unwrap();
        assert_eq!(summary.suggested_slide_count, 10);
        assert_eq!(summary.estimated_duration_minutes, 15);
        assert_eq!(summary.complexity, Complexity::Intermediate);
        assert!(summary.key_points.is_empty());
        assert!(summary.outline.is_empty());
    }

    #[test]
    fn parse_discards_invalid_outline_sections() {
        let response = r#"{"outline": [
            {"title": "Kept", "level": 1},
            {"title": "No level"},
            {"level": 2},
            {"title": "Lifted", "level": 0}
        ]}"#;
        let summary = parse_summary(response).unwrap();
        let titles: Vec<&str> = summary.outline.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Kept", "Lifted"]);
        assert_eq!(summary.outline[1].level, 1);
    }

    #[test]
    fn parse_rejects_prose_only_responses() {
        assert!(matches!(
            parse_summary("I could not produce a summary."),
            Err(ParseError::NoJsonObject)
        ));
    }

    #[test]
    fn fallback_ranges_hold() {
        let short = fallback_summary(&index_for("just a few words"));
        assert_eq!(short.suggested_slide_count, 5);
        assert_eq!(short.estimated_duration_minutes, 8); // ceil(5 * 1.5)

        let words = vec!["word"; 2_000].join(" ");
        let long = fallback_summary(&index_for(&words));
        assert!((5..=25).contains(&long.suggested_slide_count));
        assert_eq!(
            long.estimated_duration_minutes,
            (long.suggested_slide_count as f64 * 1.5).ceil() as u32,
        );
    }

    #[test]
    fn fallback_derives_topics_from_headers() {
        let summary = fallback_summary(&index_for("# Alpha\ntext\n## Beta\nmore text"));
        assert_eq!(summary.main_topics, vec!["Alpha", "Beta"]);
        assert_eq!(summary.outline.len(), 2);
        assert_eq!(summary.complexity, Complexity::Intermediate);
    }

    #[test]
    fn fallback_keywords_are_frequent_long_tokens() {
        let text = "engine engine engine cache cache ox ox ox ox";
        let summary = fallback_summary(&index_for(text));
        // "ox" is too short; frequency then alphabetical ordering.
        assert_eq!(summary.keywords, vec!["engine", "cache"]);
    }

    #[test]
    fn estimator_scales_per_bucket() {
        let summary = summary_with_count(12);
        assert_eq!(estimate_slide_count(&summary, LengthBucket::Short), 8);
        assert_eq!(estimate_slide_count(&summary, LengthBucket::Medium), 12);
        assert_eq!(estimate_slide_count(&summary, LengthBucket::Long), 15);

        assert_eq!(estimate_slide_count(&summary_with_count(30), LengthBucket::Short), 10);
        assert_eq!(estimate_slide_count(&summary_with_count(4), LengthBucket::Medium), 10);
        assert_eq!(estimate_slide_count(&summary_with_count(25), LengthBucket::Long), 25);
    }

    #[test]
    fn corpus_is_clipped_with_marker() {
        let text = vec!["0123456789"; 2_000].join("\n");
        let corpus = build_corpus(&index_for(&text));
        assert!(corpus.ends_with(TRUNCATION_MARKER));
        assert!(corpus.chars().count() <= CORPUS_BUDGET + TRUNCATION_MARKER.chars().count());
    }

    #[tokio::test]
    async fn summarize_uses_backend_json() {
        let provider = Arc::new(ScriptedTextProvider::new([
            r#"{"mainTopics": ["T"], "keyPoints": ["K"], "suggestedSlideCount": 7,
               "estimatedDuration": 11, "complexity": "beginner", "keywords": ["kw"],
               "outline": []}"#,
        ]));
        let summarizer = Summarizer::new(provider);
        let summary = summarizer.summarize(&index_for("# T\nbody")).await.unwrap();
        assert_eq!(summary.suggested_slide_count, 7);
        assert_eq!(summary.complexity, Complexity::Beginner);
    }

    #[tokio::test]
    async fn summarize_falls_back_on_prose() {
        let provider = Arc::new(ScriptedTextProvider::new(["no json at all"]));
        let summarizer = Summarizer::new(provider);
        let summary = summarizer
            .summarize(&index_for("# Topic\nsome body text"))
            .await
            .unwrap();
        assert_eq!(summary.main_topics, vec!["Topic"]);
    }

    #[tokio::test]
    async fn summarize_propagates_provider_failures() {
        let summarizer = Summarizer::new(Arc::new(ScriptedTextProvider::empty()));
        let err = summarizer.summarize(&index_for("text")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Backend { .. }));
    }
}
