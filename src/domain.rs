//! Domain model: projects, pages, user stories, and scaffold artifacts.

use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project owning an ordered collection of pages. The whole aggregate is
/// persisted as one document; pages are unique by id and matched by
/// case-insensitive name when the pipeline merges discovered files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub repository_url: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
    pub created_at: String,
}

impl Project {
    pub fn new(id: i64, name: &str, repository_url: Option<String>) -> Self {
        Self {
            id,
            name: name.to_string(),
            repository_url,
            pages: Vec::new(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Find a page by case-insensitive name.
    pub fn page_by_name(&self, name: &str) -> Option<&Page> {
        self.pages
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn page_by_name_mut(&mut self, name: &str) -> Option<&mut Page> {
        self.pages
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn page_by_id(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn page_by_id_mut(&mut self, id: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }
}

/// One discovered or declared application screen/route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub name: String,
    pub route: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_stories: Vec<UserStory>,
}

impl Page {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            route: format!("/{}", slugify(name, 60)),
            description: String::new(),
            user_stories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Map a free-form priority label from generation output. The table is
    /// case-insensitive and covers the Spanish labels older generator
    /// prompts produce; anything unmapped defaults to medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "alta" => Self::High,
            "medium" | "media" => Self::Medium,
            "low" | "baja" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Planned,
    InProgress,
    Done,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

/// A generated or manually-created requirement record attached to a page.
/// Stories are never deduplicated structurally; the prompts instruct the
/// generator to avoid near-duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStory {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    pub priority: Priority,
    pub status: StoryStatus,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Set when this record is a degraded placeholder substituted for an
    /// unparseable generation response.
    #[serde(default)]
    pub needs_review: bool,
    pub created_at: String,
}

/// Kind of a backend scaffold artifact. Determines the output subdirectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Model,
    Controller,
    Route,
    Middleware,
    Config,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Controller => "controller",
            Self::Route => "route",
            Self::Middleware => "middleware",
            Self::Config => "config",
        }
    }

    /// Subdirectory under the scaffold output root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Controller => "controllers",
            Self::Route => "routes",
            Self::Middleware => "middleware",
            Self::Config => "config",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(Self::Model),
            "controller" => Ok(Self::Controller),
            "route" => Ok(Self::Route),
            "middleware" => Ok(Self::Middleware),
            "config" => Ok(Self::Config),
            _ => Err(format!("Invalid artifact kind: {}", s)),
        }
    }
}

/// Ephemeral backend scaffold record. Exists only for the duration of a
/// generation run and is flushed to the output tree, never persisted in the
/// project aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub kind: ArtifactKind,
    pub name: String,
    pub file_name: String,
    pub content: String,
    pub description: String,
}

/// Convert a name to a URL-safe slug, limited to `max_len` bytes.
pub fn slugify(name: &str, max_len: usize) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    truncate_str(&slug, max_len).trim_end_matches('-').to_string()
}

/// Truncate to at most `max_len` bytes without splitting a character.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
