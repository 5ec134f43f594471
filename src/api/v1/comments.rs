//! Comment endpoints

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::comment::Comment;
use crate::domain::prompt::PromptId;

#[derive(Debug, Deserialize)]
pub struct CommentBodyRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub prompt_id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Comment> for CommentResponse {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id().to_string(),
            prompt_id: comment.prompt_id().as_str().to_string(),
            author: comment.author().as_str().to_string(),
            body: comment.body().to_string(),
            created_at: comment.created_at().to_rfc3339(),
            updated_at: comment.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListCommentsResponse {
    pub comments: Vec<CommentResponse>,
    pub total: usize,
}

/// POST /v1/prompts/{prompt_id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
    Json(request): Json<CommentBodyRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    // Commenting requires read access to the prompt.
    state.prompts.get(&user, &id).await?;
    let comment = state.comments.create(&user, &id, request.body).await?;
    Ok(Json(CommentResponse::from(&comment)))
}

/// GET /v1/prompts/{prompt_id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(prompt_id): Path<String>,
) -> Result<Json<ListCommentsResponse>, ApiError> {
    let id = PromptId::new(prompt_id)?;
    state.prompts.get(&user, &id).await?;
    let comments = state.comments.list(&id).await?;
    let comments: Vec<CommentResponse> = comments.iter().map(CommentResponse::from).collect();
    let total = comments.len();
    Ok(Json(ListCommentsResponse { comments, total }))
}

/// PUT /v1/comments/{comment_id}
pub async fn edit_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(comment_id): Path<String>,
    Json(request): Json<CommentBodyRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state.comments.edit(&user, &comment_id, request.body).await?;
    Ok(Json(CommentResponse::from(&comment)))
}

/// DELETE /v1/comments/{comment_id}
pub async fn delete_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(comment_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.comments.delete(&user, &comment_id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
