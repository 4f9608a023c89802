//! The sync pipeline orchestrator.
//!
//! Stages: acquire workdir → clone → discover pages → per-file processing →
//! cleanup. A precondition failure aborts before any I/O; clone and
//! discovery faults abort the run (after cleanup); a failure inside one
//! file's processing is recorded in the ledger and the loop continues —
//! one bad file never aborts the batch.
//!
//! Files are processed sequentially: a run is one logical thread of
//! control, which bounds generation-service concurrency and keeps failure
//! isolation trivial. Nothing prevents two concurrent runs against the same
//! project; interleaved saves are last-writer-wins at aggregate granularity.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::domain::{Project, UserStory};
use crate::errors::SyncError;
use crate::generation::GenerationClient;
use crate::parser::{self, StoryParse};
use crate::persist;
use crate::prompt::PromptStage;
use crate::retry::RetryPolicy;
use crate::store::StoreHandle;
use crate::sync::discover::{self, FileRef, PAGE_DIR_CANDIDATES, SOURCE_EXTENSIONS};
use crate::sync::imports::resolve_imports;
use crate::sync::repo::clone_repository;
use crate::sync::workdir::Workdir;

/// Knobs for a pipeline run. Tests shrink the cleanup delays.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub workdir_root: PathBuf,
    pub cleanup: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workdir_root: std::env::temp_dir(),
            cleanup: RetryPolicy::default(),
        }
    }
}

/// Ledger entry for one discovered file.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOutcome {
    pub page_name: String,
    pub user_stories: Vec<UserStory>,
    /// The generation response could not be parsed and a placeholder story
    /// was substituted.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final output of a run.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub pages_processed: usize,
    pub total_user_stories: usize,
    pub details: Vec<PageOutcome>,
}

pub struct SyncPipeline<'a> {
    store: &'a StoreHandle,
    client: &'a dyn GenerationClient,
    options: SyncOptions,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        store: &'a StoreHandle,
        client: &'a dyn GenerationClient,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            client,
            options,
        }
    }

    /// Run the full pipeline against `project`, mutating its page tree and
    /// persisting after each processed file.
    pub async fn run(&self, project: &mut Project) -> Result<SyncSummary, SyncError> {
        let url = project
            .repository_url
            .clone()
            .ok_or(SyncError::MissingRepositoryUrl { id: project.id })?;

        let workdir =
            Workdir::acquire(&self.options.workdir_root, &project.id.to_string()).await?;

        if let Err(e) = clone_repository(&url, &workdir.path().join("repo")).await {
            self.cleanup(workdir).await;
            return Err(e);
        }
        let repo_root = workdir.path().join("repo");

        let Some(pages_dir) = discover::find_source_dir(&repo_root, PAGE_DIR_CANDIDATES) else {
            self.cleanup(workdir).await;
            return Err(SyncError::SourceDirNotFound { root: repo_root });
        };

        let files = discover::list_source_files(&pages_dir, SOURCE_EXTENSIONS, true);
        if files.is_empty() {
            self.cleanup(workdir).await;
            return Err(SyncError::NoSourceFiles { dir: pages_dir });
        }

        info!(
            project_id = project.id,
            files = files.len(),
            dir = %pages_dir.display(),
            "processing discovered page files"
        );

        let mut details = Vec::with_capacity(files.len());
        for file in &files {
            details.push(self.process_file(project, file).await);
        }

        // Cleanup runs on this path and on every abort path above; its
        // outcome never changes the run's result.
        self.cleanup(workdir).await;

        let total_user_stories = details.iter().map(|d| d.user_stories.len()).sum();
        Ok(SyncSummary {
            pages_processed: details.len(),
            total_user_stories,
            details,
        })
    }

    /// Process one file, converting every failure into a ledger entry.
    async fn process_file(&self, project: &mut Project, file: &FileRef) -> PageOutcome {
        let page_name = file.stem();
        match self.process_file_inner(project, file, &page_name).await {
            Ok((user_stories, degraded)) => PageOutcome {
                page_name,
                user_stories,
                degraded,
                error: None,
            },
            Err(e) => {
                warn!(
                    project_id = project.id,
                    file = %file.relative,
                    error = %format!("{:#}", e),
                    "file processing failed; continuing with next file"
                );
                PageOutcome {
                    page_name,
                    user_stories: Vec::new(),
                    degraded: false,
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }

    async fn process_file_inner(
        &self,
        project: &mut Project,
        file: &FileRef,
        page_name: &str,
    ) -> anyhow::Result<(Vec<UserStory>, bool)> {
        let content = tokio::fs::read_to_string(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.relative))?;

        let file_dir = file.path.parent().unwrap_or(Path::new("."));
        let imports = resolve_imports(&content, file_dir);

        let existing = project
            .page_by_name(page_name)
            .map(|p| p.user_stories.clone())
            .unwrap_or_default();

        let prompt = PromptStage::PageAnalysis {
            file_name: &file.relative,
            content: &content,
            imports: &imports,
            existing: &existing,
        }
        .render();

        let response = self
            .client
            .generate(&prompt)
            .await
            .with_context(|| format!("Generation failed for {}", file.relative))?;

        let (stories, degraded) = promote_stories(parse_stories_logged(&response, &file.relative));

        persist::merge_user_stories(project, page_name, stories.clone());
        persist::save_project(self.store, project)
            .await
            .with_context(|| format!("Failed to persist stories for {}", file.relative))?;

        Ok((stories, degraded))
    }

    async fn cleanup(&self, workdir: Workdir) {
        if let Err(e) = workdir.release(self.options.cleanup).await {
            // Leaked directories are an operational follow-up, not a run
            // failure.
            error!(error = %e, "working directory cleanup exhausted its retries");
        }
    }
}

fn parse_stories_logged(response: &str, file: &str) -> StoryParse {
    let outcome = parser::parse_stories(response);
    if let StoryParse::Degraded { .. } = &outcome {
        warn!(
            file,
            "generation response was unparseable; substituting placeholder story"
        );
    }
    outcome
}

/// Turn a parse outcome into domain stories plus the degraded flag.
fn promote_stories(outcome: StoryParse) -> (Vec<UserStory>, bool) {
    match outcome {
        StoryParse::Parsed(parsed) => (
            parsed.into_iter().map(|p| p.into_story(false)).collect(),
            false,
        ),
        StoryParse::Degraded { placeholder, .. } => (vec![placeholder.into_story(true)], true),
    }
}

/// Generate `count` additional stories for an existing page and persist
/// them. Reuses the pipeline's generate → parse → merge tail without a
/// working directory.
pub async fn generate_page_stories(
    store: &StoreHandle,
    client: &dyn GenerationClient,
    project: &mut Project,
    page_id: &str,
    count: usize,
    focus: Option<&str>,
) -> Result<Vec<UserStory>, SyncError> {
    let (page_name, existing) = {
        let page = project
            .page_by_id(page_id)
            .ok_or_else(|| anyhow::anyhow!("Page {} not found", page_id))?;
        (page.name.clone(), page.user_stories.clone())
    };

    let prompt = PromptStage::IncrementalStories {
        page_name: &page_name,
        count,
        focus,
        existing: &existing,
    }
    .render();

    let response = client
        .generate(&prompt)
        .await
        .map_err(|e| SyncError::Other(anyhow::Error::new(e)))?;

    let (stories, _degraded) = promote_stories(parse_stories_logged(&response, &page_name));
    persist::merge_user_stories(project, &page_name, stories.clone());
    persist::save_project(store, project).await?;
    Ok(stories)
}

/// Synthesize and persist a short description for an existing page from
/// its current stories.
pub async fn generate_page_description(
    store: &StoreHandle,
    client: &dyn GenerationClient,
    project: &mut Project,
    page_id: &str,
) -> Result<String, SyncError> {
    let (page_name, route, existing) = {
        let page = project
            .page_by_id(page_id)
            .ok_or_else(|| anyhow::anyhow!("Page {} not found", page_id))?;
        (page.name.clone(), page.route.clone(), page.user_stories.clone())
    };

    let prompt = PromptStage::DescriptionSynthesis {
        page_name: &page_name,
        route: &route,
        existing: &existing,
    }
    .render();

    let response = client
        .generate(&prompt)
        .await
        .map_err(|e| SyncError::Other(anyhow::Error::new(e)))?;

    let description = parser::parse_description(&response);
    if let Some(page) = project.page_by_id_mut(page_id) {
        page.description = description.clone();
    }
    persist::save_project(store, project).await?;
    Ok(description)
}
