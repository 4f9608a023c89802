//! Backend scaffold generation.
//!
//! Same acquire → clone → discover → per-item loop → cleanup shape as the
//! sync pipeline, but aimed at the repository's API surface: for each
//! discovered file, one targeted generation per backend concern (models,
//! controllers, routes). The collected artifacts are ephemeral and flushed
//! to a fixed output directory tree; nothing is written into the project
//! aggregate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::domain::{ArtifactKind, GeneratedArtifact, Project, slugify};
use crate::errors::SyncError;
use crate::generation::GenerationClient;
use crate::parser::{self, ArtifactParse};
use crate::prompt::{BackendTarget, PromptStage};
use crate::retry::RetryPolicy;
use crate::sync::discover::{self, API_DIR_CANDIDATES, SOURCE_EXTENSIONS};
use crate::sync::repo::clone_repository;
use crate::sync::workdir::Workdir;

const BACKEND_TARGETS: &[BackendTarget] = &[
    BackendTarget::Models,
    BackendTarget::Controllers,
    BackendTarget::Routes,
];

#[derive(Debug, Clone)]
pub struct ScaffoldOptions {
    pub output_root: PathBuf,
    pub include_database: bool,
    pub framework: String,
    pub workdir_root: PathBuf,
    pub cleanup: RetryPolicy,
}

impl ScaffoldOptions {
    pub fn new(output_root: PathBuf) -> Self {
        Self {
            output_root,
            include_database: true,
            framework: "express".to_string(),
            workdir_root: std::env::temp_dir(),
            cleanup: RetryPolicy::default(),
        }
    }
}

/// Ledger entry for one (source file, backend concern) generation.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactOutcome {
    pub source_file: String,
    pub target: String,
    pub artifacts: usize,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldSummary {
    /// Artifact counts keyed by kind ("model", "controller", ...).
    pub counts: BTreeMap<String, usize>,
    /// Paths written under the output root, relative to it.
    pub files: Vec<String>,
    pub details: Vec<ArtifactOutcome>,
}

pub struct ScaffoldPipeline<'a> {
    client: &'a dyn GenerationClient,
    options: ScaffoldOptions,
}

impl<'a> ScaffoldPipeline<'a> {
    pub fn new(client: &'a dyn GenerationClient, options: ScaffoldOptions) -> Self {
        Self { client, options }
    }

    pub async fn run(&self, project: &Project) -> Result<ScaffoldSummary, SyncError> {
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

        let Some(api_dir) = discover::find_source_dir(&repo_root, API_DIR_CANDIDATES) else {
            self.cleanup(workdir).await;
            return Err(SyncError::SourceDirNotFound { root: repo_root });
        };

        let files = discover::list_source_files(&api_dir, SOURCE_EXTENSIONS, true);
        if files.is_empty() {
            self.cleanup(workdir).await;
            return Err(SyncError::NoSourceFiles { dir: api_dir });
        }

        info!(
            project_id = project.id,
            files = files.len(),
            "generating backend scaffold from API surface"
        );

        let mut artifacts: Vec<GeneratedArtifact> = Vec::new();
        let mut details = Vec::new();

        for file in &files {
            let content = match tokio::fs::read_to_string(&file.path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %file.relative, error = %e, "failed to read API file");
                    for target in BACKEND_TARGETS {
                        details.push(ArtifactOutcome {
                            source_file: file.relative.clone(),
                            target: target.as_str().to_string(),
                            artifacts: 0,
                            degraded: false,
                            error: Some(format!("Failed to read file: {}", e)),
                        });
                    }
                    continue;
                }
            };

            for target in BACKEND_TARGETS {
                let outcome = self
                    .generate_target(&file.relative, &content, *target, &mut artifacts)
                    .await;
                details.push(outcome);
            }
        }

        self.cleanup(workdir).await;

        artifacts.extend(synthesized_artifacts(self.options.include_database));

        let files_written = flush_artifacts(
            &artifacts,
            &self.options.output_root,
            project,
            self.options.include_database,
        )
        .await?;

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for artifact in &artifacts {
            *counts.entry(artifact.kind.as_str().to_string()).or_default() += 1;
        }

        Ok(ScaffoldSummary {
            counts,
            files: files_written,
            details,
        })
    }

    /// One generation call for one (file, concern) pair. Failures are
    /// returned as ledger entries, never propagated.
    async fn generate_target(
        &self,
        file_name: &str,
        content: &str,
        target: BackendTarget,
        artifacts: &mut Vec<GeneratedArtifact>,
    ) -> ArtifactOutcome {
        let prompt = PromptStage::BackendAnalysis {
            target,
            file_name,
            content,
            framework: &self.options.framework,
            include_database: self.options.include_database,
        }
        .render();

        let response = match self.client.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(file = file_name, target = target.as_str(), error = %e, "generation failed");
                return ArtifactOutcome {
                    source_file: file_name.to_string(),
                    target: target.as_str().to_string(),
                    artifacts: 0,
                    degraded: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let kind = target.artifact_kind();
        match parser::parse_artifacts(&response, kind) {
            ArtifactParse::Parsed(parsed) => {
                let count = parsed.len();
                artifacts.extend(parsed.into_iter().map(|p| parser::into_artifact(p, kind)));
                ArtifactOutcome {
                    source_file: file_name.to_string(),
                    target: target.as_str().to_string(),
                    artifacts: count,
                    degraded: false,
                    error: None,
                }
            }
            ArtifactParse::Degraded { placeholder, .. } => {
                warn!(
                    file = file_name,
                    target = target.as_str(),
                    "unparseable scaffold response; keeping raw output for review"
                );
                artifacts.push(parser::into_artifact(placeholder, kind));
                ArtifactOutcome {
                    source_file: file_name.to_string(),
                    target: target.as_str().to_string(),
                    artifacts: 1,
                    degraded: true,
                    error: None,
                }
            }
        }
    }

    async fn cleanup(&self, workdir: Workdir) {
        if let Err(e) = workdir.release(self.options.cleanup).await {
            error!(error = %e, "working directory cleanup exhausted its retries");
        }
    }
}

/// Static artifacts every scaffold carries: an auth middleware stub, the
/// environment config loader, and (only with a database) the connection
/// module.
fn synthesized_artifacts(include_database: bool) -> Vec<GeneratedArtifact> {
    let mut artifacts = vec![
        GeneratedArtifact {
            kind: ArtifactKind::Middleware,
            name: "auth".to_string(),
            file_name: "auth.js".to_string(),
            content: AUTH_MIDDLEWARE.to_string(),
            description: "JWT bearer-token authentication middleware".to_string(),
        },
        GeneratedArtifact {
            kind: ArtifactKind::Config,
            name: "env".to_string(),
            file_name: "index.js".to_string(),
            content: ENV_CONFIG.to_string(),
            description: "Environment configuration loader".to_string(),
        },
    ];
    if include_database {
        artifacts.push(GeneratedArtifact {
            kind: ArtifactKind::Config,
            name: "database".to_string(),
            file_name: "db.js".to_string(),
            content: DB_CONFIG.to_string(),
            description: "MongoDB connection via Mongoose".to_string(),
        });
    }
    artifacts
}

/// Write artifacts into the fixed layout under `output_root`:
/// `{models,controllers,routes,middleware,config}/` plus `package.json`
/// and `README.md`. Returns the written paths relative to the root.
pub async fn flush_artifacts(
    artifacts: &[GeneratedArtifact],
    output_root: &Path,
    project: &Project,
    include_database: bool,
) -> Result<Vec<String>, SyncError> {
    for kind in [
        ArtifactKind::Model,
        ArtifactKind::Controller,
        ArtifactKind::Route,
        ArtifactKind::Middleware,
        ArtifactKind::Config,
    ] {
        tokio::fs::create_dir_all(output_root.join(kind.dir_name()))
            .await
            .with_context(|| format!("Failed to create {} directory", kind.dir_name()))?;
    }

    let mut written = Vec::new();
    for artifact in artifacts {
        // Artifact file names come from generation output; keep only the
        // final component so a hostile name cannot escape the layout.
        let file_name = Path::new(&artifact.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.js", slugify(&artifact.name, 40)));
        let relative = format!("{}/{}", artifact.kind.dir_name(), file_name);
        tokio::fs::write(output_root.join(&relative), &artifact.content)
            .await
            .with_context(|| format!("Failed to write {}", relative))?;
        written.push(relative);
    }

    let manifest = project_manifest(project, include_database);
    tokio::fs::write(
        output_root.join("package.json"),
        serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?,
    )
    .await
    .context("Failed to write package.json")?;
    written.push("package.json".to_string());

    tokio::fs::write(
        output_root.join("README.md"),
        scaffold_readme(project, artifacts, include_database),
    )
    .await
    .context("Failed to write README.md")?;
    written.push("README.md".to_string());

    Ok(written)
}

/// Project manifest for the generated backend. With `include_database`
/// off, no database driver appears in the dependency set.
fn project_manifest(project: &Project, include_database: bool) -> serde_json::Value {
    let mut dependencies = serde_json::json!({
        "cors": "^2.8.5",
        "dotenv": "^16.4.5",
        "express": "^4.19.2",
        "jsonwebtoken": "^9.0.2",
    });
    if include_database {
        dependencies["mongoose"] = serde_json::json!("^8.6.0");
    }
    serde_json::json!({
        "name": format!("{}-backend", slugify(&project.name, 40)),
        "version": "0.1.0",
        "description": format!("Generated backend scaffold for {}", project.name),
        "main": "server.js",
        "scripts": {
            "start": "node server.js",
            "dev": "nodemon server.js",
        },
        "dependencies": dependencies,
        "devDependencies": {
            "nodemon": "^3.1.4",
        },
    })
}

fn scaffold_readme(
    project: &Project,
    artifacts: &[GeneratedArtifact],
    include_database: bool,
) -> String {
    let mut readme = format!(
        "# {} backend\n\nGenerated backend scaffold.\n\n## Layout\n\n",
        project.name
    );
    for kind in [
        ArtifactKind::Model,
        ArtifactKind::Controller,
        ArtifactKind::Route,
        ArtifactKind::Middleware,
        ArtifactKind::Config,
    ] {
        let names: Vec<&str> = artifacts
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.file_name.as_str())
            .collect();
        readme.push_str(&format!(
            "- `{}/` — {}\n",
            kind.dir_name(),
            if names.is_empty() {
                "(empty)".to_string()
            } else {
                names.join(", ")
            }
        ));
    }
    readme.push_str("\n## Setup\n\n```\nnpm install\nnpm run dev\n```\n");
    if include_database {
        readme.push_str("\nSet `MONGODB_URI` before starting.\n");
    }
    readme
}

const AUTH_MIDDLEWARE: &str = r#"const jwt = require('jsonwebtoken');

module.exports = function auth(req, res, next) {
  const header = req.headers.authorization || '';
  const token = header.startsWith('Bearer ') ? header.slice(7) : null;
  if (!token) {
    return res.status(401).json({ error: 'Missing bearer token' });
  }
  try {
    req.user = jwt.verify(token, process.env.JWT_SECRET);
    next();
  } catch (err) {
    res.status(401).json({ error: 'Invalid token' });
  }
};
"#;

const ENV_CONFIG: &str = r#"require('dotenv').config();

module.exports = {
  port: process.env.PORT || 3000,
  jwtSecret: process.env.JWT_SECRET || 'change-me',
};
"#;

const DB_CONFIG: &str = r#"const mongoose = require('mongoose');

async function connect() {
  const uri = process.env.MONGODB_URI;
  if (!uri) {
    throw new Error('MONGODB_URI is not set');
  }
  await mongoose.connect(uri);
}

module.exports = { connect };
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(kind: ArtifactKind, file_name: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            kind,
            name: file_name.trim_end_matches(".js").to_string(),
            file_name: file_name.to_string(),
            content: "// generated".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn flush_creates_fixed_layout_and_manifest() {
        let out = TempDir::new().unwrap();
        let project = Project::new(1, "My Shop", None);
        let artifacts = vec![
            artifact(ArtifactKind::Model, "User.js"),
            artifact(ArtifactKind::Controller, "userController.js"),
            artifact(ArtifactKind::Route, "users.js"),
        ];

        let written = flush_artifacts(&artifacts, out.path(), &project, true)
            .await
            .unwrap();

        for dir in ["models", "controllers", "routes", "middleware", "config"] {
            assert!(out.path().join(dir).is_dir(), "{dir} missing");
        }
        assert!(out.path().join("models/User.js").is_file());
        assert!(out.path().join("package.json").is_file());
        assert!(out.path().join("README.md").is_file());
        assert!(written.contains(&"models/User.js".to_string()));
        assert!(written.contains(&"package.json".to_string()));
    }

    #[tokio::test]
    async fn manifest_without_database_has_no_database_dependency() {
        let out = TempDir::new().unwrap();
        let project = Project::new(1, "shop", None);

        flush_artifacts(&[], out.path(), &project, false).await.unwrap();

        let manifest = std::fs::read_to_string(out.path().join("package.json")).unwrap();
        assert!(!manifest.contains("mongoose"));
        assert!(manifest.contains("express"));
    }

    #[tokio::test]
    async fn manifest_with_database_includes_driver() {
        let out = TempDir::new().unwrap();
        let project = Project::new(1, "shop", None);

        flush_artifacts(&[], out.path(), &project, true).await.unwrap();

        let manifest = std::fs::read_to_string(out.path().join("package.json")).unwrap();
        assert!(manifest.contains("mongoose"));
    }

    #[tokio::test]
    async fn hostile_artifact_file_names_cannot_escape_layout() {
        let out = TempDir::new().unwrap();
        let project = Project::new(1, "shop", None);
        let artifacts = vec![artifact(ArtifactKind::Model, "../../evil.js")];

        let written = flush_artifacts(&artifacts, out.path(), &project, false)
            .await
            .unwrap();

        assert!(written.contains(&"models/evil.js".to_string()));
        assert!(out.path().join("models/evil.js").is_file());
        assert!(!out.path().parent().unwrap().join("evil.js").exists());
    }

    #[test]
    fn synthesized_artifacts_respect_database_flag() {
        let with_db = synthesized_artifacts(true);
        assert!(with_db.iter().any(|a| a.file_name == "db.js"));
        let without_db = synthesized_artifacts(false);
        assert!(!without_db.iter().any(|a| a.file_name == "db.js"));
        assert!(without_db.iter().any(|a| a.kind == ArtifactKind::Middleware));
    }
}
