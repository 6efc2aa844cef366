//! REST API.
//!
//! Two generation endpoints drive the factory; the project endpoints are a
//! thin CRUD layer over the local store. Callers identify the user with a
//! `user_id`; authentication happens in front of this service.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use base64::Engine;
use ideaforge_agents::factory::{Factory, FactoryError, FrameworkResult, RepoRequest, SecurityReport};
use ideaforge_agents::{IdeaRequest, NewProject, PipelineError, Project, ProjectStore, ProjectSummary, StoreError};
use ideaforge_chain::DeploymentDetails;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub factory: Factory,
    pub projects: ProjectStore,
}

// ── Errors ─────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Project not found")]
    NotFound,
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingUserId => ApiError::BadRequest(e.to_string()),
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Factory(FactoryError::Pipeline(PipelineError::Schema(_))) => StatusCode::BAD_GATEWAY,
            ApiError::Factory(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

// ── Router ─────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/generate-framework", post(generate_framework))
        .route("/api/generate-zip", post(generate_zip))
        .route("/api/projects", post(create_project).get(list_projects))
        .route("/api/projects/{id}", get(get_project).delete(delete_project))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Reject a blank idea and treat a blank industry as absent.
fn clean_idea(idea: &mut IdeaRequest) -> Result<(), ApiError> {
    if idea.idea.trim().is_empty() {
        return Err(ApiError::BadRequest("idea is required".into()));
    }
    idea.industry = idea.industry.take().filter(|s| !s.trim().is_empty());
    Ok(())
}

// ── Generation ─────────────────────────────────────────────────────────

async fn generate_framework(
    State(state): State<Arc<AppState>>,
    Json(mut idea): Json<IdeaRequest>,
) -> Result<Json<FrameworkResult>, ApiError> {
    clean_idea(&mut idea)?;
    Ok(Json(state.factory.generate_framework(&idea).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ZipResponse {
    pub zip_base64: String,
    pub security_report: SecurityReport,
    pub deployment: Option<DeploymentDetails>,
    pub deployment_error: Option<String>,
}

async fn generate_zip(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<RepoRequest>,
) -> Result<Json<ZipResponse>, ApiError> {
    clean_idea(&mut request.idea)?;
    let result = state.factory.generate_repo(&request).await?;
    Ok(Json(ZipResponse {
        zip_base64: base64::engine::general_purpose::STANDARD.encode(&result.zip),
        security_report: result.security_report,
        deployment: result.deployment,
        deployment_error: result.deployment_error,
    }))
}

// ── Projects ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateProject {
    #[serde(default)]
    user_id: String,
    #[serde(flatten)]
    project: NewProject,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    #[serde(default)]
    user_id: String,
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.projects.create(&body.user_id, body.project)?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    Ok(Json(state.projects.list(&q.user_id)?))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Project>, ApiError> {
    state.projects.get(&q.user_id, &id)?.map(Json).ok_or(ApiError::NotFound)
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.projects.delete(&q.user_id, &id)? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "message": "Project deleted successfully" })))
}
