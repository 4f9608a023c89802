//! Tolerant parser for generation-service responses.
//!
//! Responses are free-form text expected to contain a fenced ```json block.
//! Parsing never fails: a well-formed fenced block is decoded directly; on
//! absence or decode failure the fence markers are stripped and the largest
//! bracket-delimited JSON array in the remainder is tried; if that also
//! fails, exactly one placeholder record flagged `needs_review` is
//! synthesized so one malformed response cannot stall a run. Callers see the
//! degradation explicitly through the tagged outcome.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    ArtifactKind, GeneratedArtifact, Priority, StoryStatus, UserStory, truncate_str,
};

/// A user story as decoded from generation output, before ids and status
/// are assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStory {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
}

impl ParsedStory {
    /// Promote to a domain record, assigning an id and mapping the
    /// free-form priority label.
    pub fn into_story(self, needs_review: bool) -> UserStory {
        UserStory {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            description: self.description,
            acceptance_criteria: self.acceptance_criteria,
            priority: Priority::from_label(&self.priority),
            status: StoryStatus::Planned,
            estimated_hours: self.estimated_hours,
            needs_review,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A scaffold artifact as decoded from generation output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedArtifact {
    pub name: String,
    pub file_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
}

/// Outcome of parsing a story-generation response. Never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryParse {
    Parsed(Vec<ParsedStory>),
    /// The response could not be decoded; `placeholder` is the single
    /// synthetic record substituted for it.
    Degraded {
        placeholder: ParsedStory,
        raw: String,
    },
}

/// Outcome of parsing a scaffold-artifact response. Never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactParse {
    Parsed(Vec<ParsedArtifact>),
    Degraded {
        placeholder: ParsedArtifact,
        raw: String,
    },
}

/// Parse user stories out of a generation response.
pub fn parse_stories(raw: &str) -> StoryParse {
    if let Some(stories) = decode_array::<ParsedStory>(raw)
        && !stories.is_empty()
    {
        return StoryParse::Parsed(stories);
    }
    StoryParse::Degraded {
        placeholder: ParsedStory {
            title: "Needs review: unparseable generation output".to_string(),
            description: format!(
                "The generation service returned output that could not be parsed. \
                 Raw output (truncated): {}",
                truncate_str(raw.trim(), 500)
            ),
            acceptance_criteria: vec![
                "A human reviews the raw output and rewrites this story".to_string(),
            ],
            priority: "medium".to_string(),
            estimated_hours: None,
        },
        raw: raw.to_string(),
    }
}

/// Parse scaffold artifacts out of a generation response. `kind` only
/// shapes the placeholder's file name on the degraded path.
pub fn parse_artifacts(raw: &str, kind: ArtifactKind) -> ArtifactParse {
    if let Some(artifacts) = decode_array::<ParsedArtifact>(raw)
        && !artifacts.is_empty()
    {
        return ArtifactParse::Parsed(artifacts);
    }
    ArtifactParse::Degraded {
        placeholder: ParsedArtifact {
            name: format!("unparsed-{}", kind.as_str()),
            file_name: format!("UNPARSED_{}.txt", kind.as_str()),
            content: raw.to_string(),
            description: "Raw generation output preserved for manual review".to_string(),
        },
        raw: raw.to_string(),
    }
}

/// Promote a parsed artifact to a domain record.
pub fn into_artifact(parsed: ParsedArtifact, kind: ArtifactKind) -> GeneratedArtifact {
    GeneratedArtifact {
        kind,
        name: parsed.name,
        file_name: parsed.file_name,
        content: parsed.content,
        description: parsed.description,
    }
}

/// Extract plain description text: prefer the fenced block if present,
/// otherwise strip fence markers, then trim and bound the result.
pub fn parse_description(raw: &str) -> String {
    let body = extract_fenced_block(raw)
        .unwrap_or_else(|| strip_fences(raw));
    truncate_str(body.trim(), 600).to_string()
}

fn decode_array<T: serde::de::DeserializeOwned>(raw: &str) -> Option<Vec<T>> {
    // Pass 1: fenced block.
    if let Some(inner) = extract_fenced_block(raw)
        && let Some(json) = extract_json_array(&inner)
        && let Ok(values) = serde_json::from_str::<Vec<T>>(&json)
    {
        return Some(values);
    }
    // Pass 2: strip fences, take the outermost array from the whole text.
    let stripped = strip_fences(raw);
    let json = extract_json_array(&stripped)?;
    serde_json::from_str::<Vec<T>>(&json).ok()
}

/// Return the inner text of the first fenced code block, if any. Accepts an
/// optional language tag after the opening fence.
fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the language tag line ("json", "js", or empty).
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].to_string())
}

/// Remove all fence markers, keeping the text between and around them.
fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the outermost bracket-balanced JSON array from text that may
/// contain other content. Bracket counting ignores brackets inside string
/// literals.
fn extract_json_array(text: &str) -> Option<String> {
    let start = text.find('[')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
