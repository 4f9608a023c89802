//! Typed error hierarchy for the storymill pipeline.
//!
//! Three top-level types cover the three failure classes:
//! - `SyncError` — run-terminal faults (precondition, acquisition, discovery)
//! - `GenerationError` — faults from the external generation service
//! - `CleanupError` — working-directory teardown exhaustion
//!
//! Per-file faults are never represented here: they are recorded as strings
//! in the run ledger and the pipeline continues.

use std::path::PathBuf;

use thiserror::Error;

/// Run-terminal errors from the sync and scaffold pipelines.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Project {id} has no repository URL configured")]
    MissingRepositoryUrl { id: i64 },

    #[error("Generation service credential is not configured")]
    MissingCredential,

    #[error("Failed to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("No pages or API directory found under {root}")]
    SourceDirNotFound { root: PathBuf },

    #[error("No source files found under {dir}")]
    NoSourceFiles { dir: PathBuf },

    #[error("Failed to create working directory at {path}: {source}")]
    WorkdirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from a single call to the generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Generation service returned an empty response")]
    Empty,
}

/// Working-directory teardown gave up after `attempts` tries.
///
/// Logged by the orchestrator but never changes the run's reported outcome;
/// a leaked directory is an operational follow-up, not a pipeline failure.
#[derive(Debug, Error)]
#[error("Failed to remove working directory {path} after {attempts} attempts")]
pub struct CleanupError {
    pub path: PathBuf,
    pub attempts: u32,
    #[source]
    pub source: Option<std::io::Error>,
}
