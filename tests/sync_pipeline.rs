//! End-to-end pipeline tests against local fixture repositories.
//!
//! Fixtures are real git repositories built in temp directories and cloned
//! by path, so the full acquire → clone → discover → process → cleanup
//! path runs without network access. The generation service is a scripted
//! in-process client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use storymill::domain::{Priority, Project};
use storymill::errors::{GenerationError, SyncError};
use storymill::generation::GenerationClient;
use storymill::retry::RetryPolicy;
use storymill::store::{ProjectStore, StoreHandle};
use storymill::sync::pipeline::{self, SyncOptions, SyncPipeline};
use storymill::sync::scaffold::{ScaffoldOptions, ScaffoldPipeline};

const STORIES_RESPONSE: &str = r#"Here you go:
```json
[
  {"title": "View hero banner", "description": "As a visitor, I want to see the hero banner", "acceptanceCriteria": ["banner renders"], "priority": "Alta", "estimatedHours": 3},
  {"title": "Open navigation", "description": "As a visitor, I want navigation links", "acceptanceCriteria": [], "priority": "Media"},
  {"title": "Dismiss cookie notice", "description": "As a visitor, I want to dismiss notices", "priority": "Baja"},
  {"title": "Unlabeled priority", "description": "Defaults to medium", "priority": ""}
]
```"#;

const ARTIFACTS_RESPONSE: &str = r#"```json
[
  {"name": "User", "fileName": "User.js", "content": "module.exports = {};", "description": "user model"}
]
```"#;

/// Scripted generation client: returns `response`, or an API error when the
/// prompt mentions `fail_on`.
struct ScriptedClient {
    response: String,
    fail_on: Option<&'static str>,
}

impl ScriptedClient {
    fn stories() -> Self {
        Self {
            response: STORIES_RESPONSE.to_string(),
            fail_on: None,
        }
    }

    fn with_response(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_on: None,
        }
    }

    fn failing_on(fail_on: &'static str) -> Self {
        Self {
            response: STORIES_RESPONSE.to_string(),
            fail_on: Some(fail_on),
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if let Some(marker) = self.fail_on
            && prompt.contains(marker)
        {
            return Err(GenerationError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        Ok(self.response.clone())
    }
}

/// Build a git repository containing `files` and commit them.
fn fixture_repo(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("fixture", "fixture@localhost").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "fixture", &tree, &[])
        .unwrap();
    drop(tree);
    dir
}

struct Harness {
    store: StoreHandle,
    workdir_root: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: StoreHandle::new(ProjectStore::new_in_memory().unwrap()),
            workdir_root: TempDir::new().unwrap(),
        }
    }

    async fn project(&self, repo: &Path) -> Project {
        let url = repo.to_str().unwrap().to_string();
        self.store
            .call(move |s| s.create_project("fixture", Some(url.as_str())))
            .await
            .unwrap()
    }

    fn options(&self) -> SyncOptions {
        SyncOptions {
            workdir_root: self.workdir_root.path().to_path_buf(),
            cleanup: RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_millis(1),
            },
        }
    }

    fn workdir_is_empty(&self) -> bool {
        std::fs::read_dir(self.workdir_root.path())
            .unwrap()
            .next()
            .is_none()
    }
}

#[tokio::test]
async fn sync_discovers_page_and_generates_stories() {
    let repo = fixture_repo(&[
        (
            "pages/Home.jsx",
            "import Header from '../components/Header.jsx';\nexport default function Home() { return <Header />; }",
        ),
        (
            "components/Header.jsx",
            "export default function Header() { return <nav />; }",
        ),
    ]);

    let harness = Harness::new();
    let mut project = harness.project(repo.path()).await;
    let client = ScriptedClient::stories();
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());

    let summary = runner.run(&mut project).await.unwrap();

    assert_eq!(summary.pages_processed, 1);
    assert!(summary.total_user_stories >= 1);
    assert!(summary.details[0].error.is_none());
    assert!(!summary.details[0].degraded);

    let page = project.page_by_name("Home").expect("page created");
    assert_eq!(page.name, "Home");
    assert!(!page.user_stories.is_empty());

    // The save happened through the store too.
    let id = project.id;
    let persisted = harness
        .store
        .call(move |s| s.get_project(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.pages.len(), 1);
    assert_eq!(persisted.pages[0].user_stories.len(), 4);

    // Working directory released.
    assert!(harness.workdir_is_empty());
}

#[tokio::test]
async fn priority_labels_map_through_the_fixed_table() {
    let repo = fixture_repo(&[("pages/Home.jsx", "export default () => null;")]);
    let harness = Harness::new();
    let mut project = harness.project(repo.path()).await;
    let client = ScriptedClient::stories();
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());

    runner.run(&mut project).await.unwrap();

    let stories = &project.page_by_name("Home").unwrap().user_stories;
    let priorities: Vec<Priority> = stories.iter().map(|s| s.priority).collect();
    assert_eq!(
        priorities,
        vec![
            Priority::High,   // "Alta"
            Priority::Medium, // "Media"
            Priority::Low,    // "Baja"
            Priority::Medium, // ""
        ]
    );
}

#[tokio::test]
async fn per_file_failure_is_isolated_to_its_ledger_entry() {
    let repo = fixture_repo(&[
        ("pages/About.jsx", "export default () => 'about';"),
        ("pages/Broken.jsx", "export default () => 'broken';"),
        ("pages/Contact.jsx", "export default () => 'contact';"),
    ]);

    let harness = Harness::new();
    let mut project = harness.project(repo.path()).await;
    let client = ScriptedClient::failing_on("Broken.jsx");
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());

    let summary = runner.run(&mut project).await.unwrap();

    assert_eq!(summary.pages_processed, 3);
    let failed: Vec<_> = summary
        .details
        .iter()
        .filter(|d| d.error.is_some())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].page_name, "Broken");

    // The two healthy files still produced pages.
    assert!(project.page_by_name("About").is_some());
    assert!(project.page_by_name("Contact").is_some());
    assert!(project.page_by_name("Broken").is_none());
    assert!(harness.workdir_is_empty());
}

#[tokio::test]
async fn unparseable_response_degrades_to_flagged_placeholder() {
    let repo = fixture_repo(&[("pages/Home.jsx", "export default () => null;")]);
    let harness = Harness::new();
    let mut project = harness.project(repo.path()).await;
    let client = ScriptedClient::with_response("I cannot help with that.");
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());

    let summary = runner.run(&mut project).await.unwrap();

    assert_eq!(summary.pages_processed, 1);
    assert!(summary.details[0].degraded);
    assert!(summary.details[0].error.is_none());

    let stories = &project.page_by_name("Home").unwrap().user_stories;
    assert_eq!(stories.len(), 1);
    assert!(stories[0].needs_review);
}

#[tokio::test]
async fn repo_without_pages_directory_is_a_discovery_error() {
    let repo = fixture_repo(&[("lib/util.js", "module.exports = {};")]);
    let harness = Harness::new();
    let mut project = harness.project(repo.path()).await;
    let client = ScriptedClient::stories();
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());

    let err = runner.run(&mut project).await.unwrap_err();
    assert!(matches!(err, SyncError::SourceDirNotFound { .. }));
    // Cleanup ran on the abort path too.
    assert!(harness.workdir_is_empty());
}

#[tokio::test]
async fn project_without_repository_url_fails_precondition() {
    let harness = Harness::new();
    let mut project = harness
        .store
        .call(|s| s.create_project("no-repo", None))
        .await
        .unwrap();
    let client = ScriptedClient::stories();
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());

    let err = runner.run(&mut project).await.unwrap_err();
    assert!(matches!(err, SyncError::MissingRepositoryUrl { .. }));
}

#[tokio::test]
async fn clone_failure_aborts_after_cleanup() {
    let harness = Harness::new();
    let url = "/definitely/not/a/repository".to_string();
    let mut project = harness
        .store
        .call(move |s| s.create_project("bad-url", Some(url.as_str())))
        .await
        .unwrap();
    let client = ScriptedClient::stories();
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());

    let err = runner.run(&mut project).await.unwrap_err();
    assert!(matches!(err, SyncError::Clone { .. }));
    assert!(harness.workdir_is_empty());
}

#[tokio::test]
async fn incremental_story_generation_appends_and_persists() {
    let repo = fixture_repo(&[("pages/Home.jsx", "export default () => null;")]);
    let harness = Harness::new();
    let mut project = harness.project(repo.path()).await;
    let client = ScriptedClient::stories();
    let runner = SyncPipeline::new(&harness.store, &client, harness.options());
    runner.run(&mut project).await.unwrap();

    let before = project.page_by_name("Home").unwrap().user_stories.len();
    let page_id = project.page_by_name("Home").unwrap().id.clone();

    let incremental = ScriptedClient::with_response(
        r#"```json
[{"title": "Brand new story", "description": "d", "priority": "high"}]
```"#,
    );
    let added = pipeline::generate_page_stories(
        &harness.store,
        &incremental,
        &mut project,
        &page_id,
        1,
        Some("navigation"),
    )
    .await
    .unwrap();

    assert_eq!(added.len(), 1);
    assert_eq!(
        project.page_by_name("Home").unwrap().user_stories.len(),
        before + 1
    );

    let id = project.id;
    let persisted = harness
        .store
        .call(move |s| s.get_project(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.pages[0].user_stories.len(), before + 1);
}

#[tokio::test]
async fn description_synthesis_updates_the_page() {
    let repo = fixture_repo(&[("pages/Home.jsx", "export default () => null;")]);
    let harness = Harness::new();
    let mut project = harness.project(repo.path()).await;
    let client = ScriptedClient::stories();
    SyncPipeline::new(&harness.store, &client, harness.options())
        .run(&mut project)
        .await
        .unwrap();

    let page_id = project.page_by_name("Home").unwrap().id.clone();
    let describer =
        ScriptedClient::with_response("The landing page with hero banner and navigation.");
    let description = pipeline::generate_page_description(
        &harness.store,
        &describer,
        &mut project,
        &page_id,
    )
    .await
    .unwrap();

    assert_eq!(
        description,
        "The landing page with hero banner and navigation."
    );
    assert_eq!(project.page_by_name("Home").unwrap().description, description);
}

#[tokio::test]
async fn scaffold_generates_layout_and_respects_database_flag() {
    let repo = fixture_repo(&[(
        "api/users.js",
        "const router = require('express').Router();\nrouter.get('/', list);\nmodule.exports = router;",
    )]);
    let harness = Harness::new();
    let project = harness.project(repo.path()).await;
    let output = TempDir::new().unwrap();

    let client = ScriptedClient::with_response(ARTIFACTS_RESPONSE);
    let mut options = ScaffoldOptions::new(output.path().to_path_buf());
    options.include_database = false;
    options.workdir_root = harness.workdir_root.path().to_path_buf();
    options.cleanup = RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(1),
    };

    let summary = ScaffoldPipeline::new(&client, options)
        .run(&project)
        .await
        .unwrap();

    // One API file, three targeted generations.
    assert_eq!(summary.details.len(), 3);
    assert!(summary.details.iter().all(|d| d.error.is_none()));
    assert_eq!(summary.counts.get("model"), Some(&1));
    assert_eq!(summary.counts.get("controller"), Some(&1));
    assert_eq!(summary.counts.get("route"), Some(&1));
    assert!(summary.files.contains(&"package.json".to_string()));

    let manifest = std::fs::read_to_string(output.path().join("package.json")).unwrap();
    assert!(!manifest.contains("mongoose"));
    assert!(output.path().join("middleware/auth.js").is_file());
    assert!(!output.path().join("config/db.js").exists());
    assert!(harness.workdir_is_empty());
}
