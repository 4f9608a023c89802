//! Prompt templates for the generation service.
//!
//! Every stage renders a single string: a fixed instructional preamble with
//! the exact JSON schema the response parser expects, the size-bounded
//! subject content, any supporting context, and an explicit instruction to
//! answer with a fenced ```json block. The schema text is kept stable per
//! stage kind so parser expectations hold across runs.

use crate::domain::{ArtifactKind, UserStory, truncate_str};
use crate::sync::imports::ResolvedImport;

/// Bytes of subject file content embedded per prompt.
const MAX_SUBJECT_LEN: usize = 8_000;
/// Bytes of supporting context (imports, existing stories) per prompt.
const MAX_CONTEXT_LEN: usize = 6_000;

const STORY_SCHEMA: &str = r#"Respond with a fenced ```json code block containing ONLY a JSON array of user stories:
```json
[
  {
    "title": "Short story title",
    "description": "As a <role>, I want <goal> so that <benefit>",
    "acceptanceCriteria": ["Criterion 1", "Criterion 2"],
    "priority": "high" | "medium" | "low",
    "estimatedHours": 4
  }
]
```
No prose outside the fenced block."#;

const ARTIFACT_SCHEMA: &str = r#"Respond with a fenced ```json code block containing ONLY a JSON array of artifacts:
```json
[
  {
    "name": "User",
    "fileName": "User.js",
    "content": "// complete file content",
    "description": "What this file provides"
  }
]
```
No prose outside the fenced block."#;

/// Which backend concern a targeted analysis should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendTarget {
    Models,
    Controllers,
    Routes,
}

impl BackendTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Models => "models",
            Self::Controllers => "controllers",
            Self::Routes => "routes",
        }
    }

    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            Self::Models => ArtifactKind::Model,
            Self::Controllers => ArtifactKind::Controller,
            Self::Routes => ArtifactKind::Route,
        }
    }
}

/// A single prompt to render for the generation service.
pub enum PromptStage<'a> {
    /// Candidate user stories from a page source file plus its resolved
    /// imports, avoiding duplicates of existing stories.
    PageAnalysis {
        file_name: &'a str,
        content: &'a str,
        imports: &'a [ResolvedImport],
        existing: &'a [UserStory],
    },
    /// One backend concern (models/controllers/routes) from an API-surface
    /// file.
    BackendAnalysis {
        target: BackendTarget,
        file_name: &'a str,
        content: &'a str,
        framework: &'a str,
        include_database: bool,
    },
    /// A short natural-language page description from its stories.
    DescriptionSynthesis {
        page_name: &'a str,
        route: &'a str,
        existing: &'a [UserStory],
    },
    /// N new non-duplicate stories for an existing page.
    IncrementalStories {
        page_name: &'a str,
        count: usize,
        focus: Option<&'a str>,
        existing: &'a [UserStory],
    },
}

impl PromptStage<'_> {
    pub fn render(&self) -> String {
        match self {
            Self::PageAnalysis {
                file_name,
                content,
                imports,
                existing,
            } => {
                let mut prompt = String::new();
                prompt.push_str(
                    "You are a requirements analyst. Analyze the following frontend page \
                     source file and produce the user stories a product team would track \
                     for it.\n\n",
                );
                prompt.push_str(STORY_SCHEMA);
                prompt.push_str(&format!(
                    "\n\n## Page file: {}\n```\n{}\n```\n",
                    file_name,
                    truncate_str(content, MAX_SUBJECT_LEN)
                ));
                if !imports.is_empty() {
                    prompt.push_str("\n## Locally imported components\n");
                    let mut budget = MAX_CONTEXT_LEN;
                    for import in *imports {
                        if budget == 0 {
                            break;
                        }
                        let snippet = truncate_str(&import.content, budget.min(2_000));
                        budget = budget.saturating_sub(snippet.len());
                        prompt.push_str(&format!(
                            "\n### {} ({})\n```\n{}\n```\n",
                            import.name,
                            import.path.display(),
                            snippet
                        ));
                    }
                }
                push_existing_stories(&mut prompt, existing);
                prompt.push_str(
                    "\nGenerate between 2 and 5 stories covering the page's visible \
                     behavior. Do not restate any existing story.\n",
                );
                prompt
            }
            Self::BackendAnalysis {
                target,
                file_name,
                content,
                framework,
                include_database,
            } => {
                let mut prompt = String::new();
                prompt.push_str(&format!(
                    "You are a backend engineer. From the following API-surface file, \
                     generate the {} for a {} application.\n\n",
                    target.as_str(),
                    framework
                ));
                prompt.push_str(ARTIFACT_SCHEMA);
                prompt.push_str(&format!(
                    "\n\n## API file: {}\n```\n{}\n```\n",
                    file_name,
                    truncate_str(content, MAX_SUBJECT_LEN)
                ));
                if *include_database {
                    prompt.push_str(
                        "\nAssume a MongoDB database accessed through Mongoose models.\n",
                    );
                } else {
                    prompt.push_str(
                        "\nDo NOT assume any database; use in-memory data structures and \
                         reference no database driver.\n",
                    );
                }
                prompt
            }
            Self::DescriptionSynthesis {
                page_name,
                route,
                existing,
            } => {
                let mut prompt = String::new();
                prompt.push_str(&format!(
                    "Write a short description (2-3 sentences, plain text, no markdown) \
                     of the \"{}\" page served at route {}. Base it on the user stories \
                     below.\n",
                    page_name, route
                ));
                push_existing_stories(&mut prompt, existing);
                prompt.push_str("\nRespond with the description text only.\n");
                prompt
            }
            Self::IncrementalStories {
                page_name,
                count,
                focus,
                existing,
            } => {
                let mut prompt = String::new();
                prompt.push_str(&format!(
                    "You are a requirements analyst. Generate exactly {} NEW user \
                     stories for the \"{}\" page.\n\n",
                    count, page_name
                ));
                prompt.push_str(STORY_SCHEMA);
                if let Some(focus) = focus {
                    prompt.push_str(&format!("\n\nFocus area: {}\n", focus));
                }
                push_existing_stories(&mut prompt, existing);
                prompt.push_str(
                    "\nEvery generated story must be meaningfully different from all \
                     existing stories above.\n",
                );
                prompt
            }
        }
    }
}

fn push_existing_stories(prompt: &mut String, existing: &[UserStory]) {
    if existing.is_empty() {
        return;
    }
    prompt.push_str("\n## Existing stories (do not duplicate)\n");
    let mut budget = MAX_CONTEXT_LEN;
    for story in existing {
        let line = format!("- {} [{}]\n", story.title, story.priority.as_str());
        if line.len() > budget {
            break;
        }
        budget -= line.len();
        prompt.push_str(&line);
    }
}
