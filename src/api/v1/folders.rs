//! Folder endpoints

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::api::v1::prompts::PromptResponse;
use crate::domain::folder::{Folder, FolderId};

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveFolderRequest {
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub owner: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Folder> for FolderResponse {
    fn from(folder: &Folder) -> Self {
        Self {
            id: folder.id().as_str().to_string(),
            name: folder.name().to_string(),
            parent_id: folder.parent_id().map(|p| p.as_str().to_string()),
            owner: folder.owner().as_str().to_string(),
            created_at: folder.created_at().to_rfc3339(),
            updated_at: folder.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListFoldersResponse {
    pub folders: Vec<FolderResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct FolderPromptsResponse {
    pub prompts: Vec<PromptResponse>,
    pub total: usize,
}

/// GET /v1/folders
pub async fn list_folders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ListFoldersResponse>, ApiError> {
    let folders = state.folders.list(&user).await?;
    let folders: Vec<FolderResponse> = folders.iter().map(FolderResponse::from).collect();
    let total = folders.len();
    Ok(Json(ListFoldersResponse { folders, total }))
}

/// POST /v1/folders
pub async fn create_folder(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreateFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    debug!(folder = %request.id, "creating folder");
    let id = FolderId::new(request.id)?;
    let parent_id = request.parent_id.map(FolderId::new).transpose()?;
    let folder = state
        .folders
        .create(&user, id, request.name, parent_id)
        .await?;
    Ok(Json(FolderResponse::from(&folder)))
}

/// GET /v1/folders/{folder_id}
pub async fn get_folder(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(folder_id): Path<String>,
) -> Result<Json<FolderResponse>, ApiError> {
    let id = FolderId::new(folder_id)?;
    let folder = state.folders.get(&user, &id).await?;
    Ok(Json(FolderResponse::from(&folder)))
}

/// GET /v1/folders/{folder_id}/children
pub async fn list_children(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(folder_id): Path<String>,
) -> Result<Json<ListFoldersResponse>, ApiError> {
    let id = FolderId::new(folder_id)?;
    let children = state.folders.children(&user, &id).await?;
    let folders: Vec<FolderResponse> = children.iter().map(FolderResponse::from).collect();
    let total = folders.len();
    Ok(Json(ListFoldersResponse { folders, total }))
}

/// GET /v1/folders/{folder_id}/ancestors
pub async fn list_ancestors(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(folder_id): Path<String>,
) -> Result<Json<ListFoldersResponse>, ApiError> {
    let id = FolderId::new(folder_id)?;
    let ancestors = state.folders.ancestors(&user, &id).await?;
    let folders: Vec<FolderResponse> = ancestors.iter().map(FolderResponse::from).collect();
    let total = folders.len();
    Ok(Json(ListFoldersResponse { folders, total }))
}

/// GET /v1/folders/{folder_id}/prompts — prompts anywhere in the subtree.
pub async fn list_folder_prompts(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(folder_id): Path<String>,
) -> Result<Json<FolderPromptsResponse>, ApiError> {
    let id = FolderId::new(folder_id)?;
    let prompts = state.folders.subtree_prompts(&user, &id).await?;
    let prompts: Vec<PromptResponse> = prompts.iter().map(PromptResponse::from).collect();
    let total = prompts.len();
    Ok(Json(FolderPromptsResponse { prompts, total }))
}

/// PUT /v1/folders/{folder_id}
pub async fn rename_folder(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(folder_id): Path<String>,
    Json(request): Json<RenameFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    let id = FolderId::new(folder_id)?;
    let folder = state.folders.rename(&user, &id, request.name).await?;
    Ok(Json(FolderResponse::from(&folder)))
}

/// POST /v1/folders/{folder_id}/move
pub async fn move_folder(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(folder_id): Path<String>,
    Json(request): Json<MoveFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    let id = FolderId::new(folder_id)?;
    let parent_id = request.parent_id.map(FolderId::new).transpose()?;
    let folder = state.folders.reparent(&user, &id, parent_id).await?;
    Ok(Json(FolderResponse::from(&folder)))
}

/// DELETE /v1/folders/{folder_id} — deletes the whole subtree.
pub async fn delete_folder(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(folder_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = FolderId::new(folder_id)?;
    state.folders.delete(&user, &id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
