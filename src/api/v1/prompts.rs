//! Prompt endpoints

use std::collections::HashMap;

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::folder::FolderId;
use crate::domain::prompt::{Prompt, PromptId, Variable, Visibility};
use crate::infrastructure::services::PromptUpdate;

#[derive(Debug, Deserialize)]
pub struct CreatePromptRequest {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromptRequest {
    pub name: Option<String>,
    /// Omitted leaves the description alone; explicit `null` clears it.
    #[serde(default)]
    pub description: Option<Option<String>>,
    pub content: Option<String>,
    pub variables: Option<Vec<Variable>>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize)]
pub struct MovePromptRequest {
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenderPromptRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub content: String,
    pub variables: Vec<Variable>,
    pub folder_id: Option<String>,
    pub visibility: Visibility,
    pub owner: String,
    pub version: String,
    pub revision: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Prompt> for PromptResponse {
    fn from(prompt: &Prompt) -> Self {
        Self {
            id: prompt.id().as_str().to_string(),
            name: prompt.name().to_string(),
            description: prompt.description().map(String::from),
            content: prompt.content().to_string(),
            variables: prompt.variables().to_vec(),
            folder_id: prompt.folder_id().map(|f| f.as_str().to_string()),
            visibility: prompt.visibility(),
            owner: prompt.owner().as_str().to_string(),
            version: prompt.version().to_string(),
            revision: prompt.revision(),
            created_at: prompt.created_at().to_rfc3339(),
            updated_at: prompt.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListPromptsResponse {
    pub prompts: Vec<PromptResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RenderPromptResponse {
    pub rendered: String,
}

/// GET /v1/prompts
pub async fn list_prompts(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ListPromptsResponse>, ApiError> {
    let prompts = state.prompts.list(&user).await?;
    let prompts: Vec<PromptResponse> = prompts.iter().map(PromptResponse::from).collect();
    let total = prompts.len();
    Ok(Json(ListPromptsResponse { prompts, total }))
}

/// POST /v1/prompts
pub async fn create_prompt(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreatePromptRequest>,
) -> Result<Json<PromptResponse>, ApiError> {
    debug!(prompt = %request.id, "creating prompt");
    let id = PromptId::new(request.id)?;
    let folder_id = request.folder_id.map(FolderId::new).transpose()?;
    let prompt = state
        .prompts
        .create(
            &user,
            id,
            request.name,
            request.content,
            request.description,
            request.variables,
            folder_id,
            request.visibility,
        )
        .await?;
    Ok(Json(PromptResponse::from(&prompt)))
}

/// GET /v1/prompts/{prompt_id}
pub async fn get_prompt(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
) -> Result<Json<PromptResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    let prompt = state.prompts.get(&user, &id).await?;
    Ok(Json(PromptResponse::from(&prompt)))
}

/// PUT /v1/prompts/{prompt_id}
pub async fn update_prompt(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
    Json(request): Json<UpdatePromptRequest>,
) -> Result<Json<PromptResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    let prompt = state
        .prompts
        .update(
            &user,
            &id,
            PromptUpdate {
                name: request.name,
                description: request.description,
                content: request.content,
                variables: request.variables,
                visibility: request.visibility,
            },
        )
        .await?;
    Ok(Json(PromptResponse::from(&prompt)))
}

/// POST /v1/prompts/{prompt_id}/move
pub async fn move_prompt(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
    Json(request): Json<MovePromptRequest>,
) -> Result<Json<PromptResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    let folder_id = request.folder_id.map(FolderId::new).transpose()?;
    let prompt = state.prompts.move_to_folder(&user, &id, folder_id).await?;
    Ok(Json(PromptResponse::from(&prompt)))
}

/// POST /v1/prompts/{prompt_id}/render
pub async fn render_prompt(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
    Json(request): Json<RenderPromptRequest>,
) -> Result<Json<RenderPromptResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    let rendered = state.prompts.render(&user, &id, &request.variables).await?;
    Ok(Json(RenderPromptResponse { rendered }))
}

/// DELETE /v1/prompts/{prompt_id}
pub async fn delete_prompt(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    state.prompts.delete(&user, &id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
