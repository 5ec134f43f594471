//! Prompt version endpoints
//!
//! Reads go through the prompt's visibility check first; commits and
//! reverts are owner-only inside the service.

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::prompt::{PromptId, Variable};
use crate::domain::version::{FieldChange, PromptVersion, VersionDiff};

#[derive(Debug, Deserialize)]
pub struct CommitVersionRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub id: String,
    pub prompt_id: String,
    pub number: u32,
    pub semver: String,
    pub bump: String,
    pub message: Option<String>,
    pub author: String,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub snapshot: SnapshotResponse,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub name: String,
    pub description: Option<String>,
    pub content: String,
    pub variables: Vec<Variable>,
}

impl From<&PromptVersion> for VersionResponse {
    fn from(version: &PromptVersion) -> Self {
        let snapshot = version.snapshot();
        Self {
            id: version.id().to_string(),
            prompt_id: version.prompt_id().as_str().to_string(),
            number: version.number(),
            semver: version.semver().to_string(),
            bump: format!("{:?}", version.bump()).to_lowercase(),
            message: version.message().map(String::from),
            author: version.author().as_str().to_string(),
            parent_id: version.parent_id().map(String::from),
            created_at: version.created_at().to_rfc3339(),
            snapshot: SnapshotResponse {
                name: snapshot.name.clone(),
                description: snapshot.description.clone(),
                content: snapshot.content.clone(),
                variables: snapshot.variables.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListVersionsResponse {
    pub versions: Vec<VersionResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DiffResponse {
    pub changes: Vec<FieldChange>,
    pub bump: String,
}

impl From<VersionDiff> for DiffResponse {
    fn from(diff: VersionDiff) -> Self {
        Self {
            bump: format!("{:?}", diff.bump).to_lowercase(),
            changes: diff.changes,
        }
    }
}

/// POST /v1/prompts/{prompt_id}/versions
pub async fn commit_version(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
    Json(request): Json<CommitVersionRequest>,
) -> Result<Json<VersionResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    debug!(prompt = %id, "committing prompt version");
    let version = state.versions.commit(&user, &id, request.message).await?;
    Ok(Json(VersionResponse::from(&version)))
}

/// GET /v1/prompts/{prompt_id}/versions
pub async fn list_versions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
) -> Result<Json<ListVersionsResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    state.prompts.get(&user, &id).await?;
    let versions = state.versions.list(&id).await?;
    let versions: Vec<VersionResponse> = versions.iter().map(VersionResponse::from).collect();
    let total = versions.len();
    Ok(Json(ListVersionsResponse { versions, total }))
}

/// GET /v1/prompts/{prompt_id}/versions/{number}
pub async fn get_version(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((prompt_id, number)): Path<(String, u32)>,
) -> Result<Json<VersionResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    state.prompts.get(&user, &id).await?;
    let version = state.versions.get(&id, number).await?;
    Ok(Json(VersionResponse::from(&version)))
}

/// GET /v1/prompts/{prompt_id}/diff?from=1&to=3
pub async fn diff_versions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
    axum::extract::Query(query): axum::extract::Query<DiffQuery>,
) -> Result<Json<DiffResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    state.prompts.get(&user, &id).await?;
    let diff = state.versions.diff(&id, query.from, query.to).await?;
    Ok(Json(DiffResponse::from(diff)))
}

/// POST /v1/prompts/{prompt_id}/versions/{number}/revert
pub async fn revert_version(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((prompt_id, number)): Path<(String, u32)>,
) -> Result<Json<VersionResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    debug!(prompt = %id, number, "reverting prompt version");
    let version = state.versions.revert(&user, &id, number).await?;
    Ok(Json(VersionResponse::from(&version)))
}
