//! HTTP API: project CRUD plus the generation endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::Project;
use crate::errors::SyncError;
use crate::generation::GenerationClient;
use crate::store::StoreHandle;
use crate::sync::pipeline::{self, SyncOptions, SyncPipeline};
use crate::sync::scaffold::{ScaffoldOptions, ScaffoldPipeline};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: StoreHandle,
    /// Absent when no generation credential is configured; every
    /// generation endpoint treats that as a fatal precondition.
    pub generation: Option<Arc<dyn GenerationClient>>,
    pub sync_options: SyncOptions,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub repository_url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBackendRequest {
    pub output_path: Option<String>,
    pub include_database: Option<bool>,
    pub framework: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateStoriesRequest {
    pub num_user_stories: Option<usize>,
    pub user_story_type: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match &err {
            SyncError::MissingRepositoryUrl { .. } => ApiError::BadRequest(err.to_string()),
            SyncError::MissingCredential => ApiError::Internal(format!(
                "Missing configuration: {}",
                err
            )),
            SyncError::Clone { .. } => ApiError::BadGateway(err.to_string()),
            SyncError::SourceDirNotFound { .. } | SyncError::NoSourceFiles { .. } => {
                ApiError::NotFound(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/{id}", get(get_project).delete(delete_project))
        .route("/projects/{id}/sync", post(sync_project))
        .route("/projects/{id}/generate-backend", post(generate_backend))
        .route(
            "/projects/{project_id}/pages/{page_id}/generate-user-stories",
            post(generate_user_stories),
        )
        .route(
            "/projects/{project_id}/pages/{page_id}/generate-description",
            post(generate_description),
        )
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

async fn load_project(state: &SharedState, id: i64) -> Result<Project, ApiError> {
    state
        .store
        .call(move |s| s.get_project(id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Project {} not found", id)))
}

/// The generation client, or the missing-configuration precondition error —
/// checked before any I/O is attempted.
fn generation_client(state: &SharedState) -> Result<Arc<dyn GenerationClient>, ApiError> {
    state
        .generation
        .clone()
        .ok_or_else(|| ApiError::from(SyncError::MissingCredential))
}

fn project_view(project: &Project) -> serde_json::Value {
    json!({
        "id": project.id,
        "name": project.name,
        "repositoryUrl": project.repository_url,
    })
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn create_project(
    State(state): State<SharedState>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Project name is required".into()));
    }
    let project = state
        .store
        .call(move |s| s.create_project(&payload.name, payload.repository_url.as_deref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = state
        .store
        .call(|s| s.list_projects())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(projects))
}

async fn get_project(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let project = load_project(&state, id).await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .store
        .call(move |s| s.delete_project(id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Project {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Full-repository analysis: clone, discover pages, generate stories per
/// file. Per-file failures come back inside `results.details`, not as an
/// error status.
async fn sync_project(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let client = generation_client(&state)?;
    let mut project = load_project(&state, id).await?;

    let runner = SyncPipeline::new(&state.store, client.as_ref(), state.sync_options.clone());
    let summary = runner.run(&mut project).await?;

    Ok(Json(json!({
        "message": "Repository analysis complete",
        "project": project_view(&project),
        "results": summary,
    })))
}

async fn generate_backend(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    payload: Option<Json<GenerateBackendRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let client = generation_client(&state)?;
    let project = load_project(&state, id).await?;
    let Json(payload) = payload.unwrap_or_default();

    let output_root = payload
        .output_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("generated-backend"));

    let mut options = ScaffoldOptions::new(output_root);
    options.include_database = payload.include_database.unwrap_or(true);
    if let Some(framework) = payload.framework {
        options.framework = framework;
    }
    options.workdir_root = state.sync_options.workdir_root.clone();
    options.cleanup = state.sync_options.cleanup;

    let runner = ScaffoldPipeline::new(client.as_ref(), options);
    let summary = runner.run(&project).await?;

    Ok(Json(json!({
        "message": "Backend scaffold generated",
        "project": project_view(&project),
        "results": summary,
    })))
}

async fn generate_user_stories(
    State(state): State<SharedState>,
    Path((project_id, page_id)): Path<(i64, String)>,
    payload: Option<Json<GenerateStoriesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let client = generation_client(&state)?;
    let mut project = load_project(&state, project_id).await?;
    if project.page_by_id(&page_id).is_none() {
        return Err(ApiError::NotFound(format!("Page {} not found", page_id)));
    }
    let Json(payload) = payload.unwrap_or_default();
    let count = payload.num_user_stories.unwrap_or(5).clamp(1, 20);

    let stories = pipeline::generate_page_stories(
        &state.store,
        client.as_ref(),
        &mut project,
        &page_id,
        count,
        payload.user_story_type.as_deref(),
    )
    .await?;

    Ok(Json(json!({
        "userStoriesCount": stories.len(),
        "userStories": stories,
    })))
}

async fn generate_description(
    State(state): State<SharedState>,
    Path((project_id, page_id)): Path<(i64, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let client = generation_client(&state)?;
    let mut project = load_project(&state, project_id).await?;
    if project.page_by_id(&page_id).is_none() {
        return Err(ApiError::NotFound(format!("Page {} not found", page_id)));
    }

    let description = pipeline::generate_page_description(
        &state.store,
        client.as_ref(),
        &mut project,
        &page_id,
    )
    .await?;

    let page = project
        .page_by_id(&page_id)
        .ok_or_else(|| ApiError::Internal("Page disappeared during generation".into()))?;

    Ok(Json(json!({
        "description": description,
        "pageInfo": {
            "id": page.id,
            "name": page.name,
            "route": page.route,
        },
    })))
}
