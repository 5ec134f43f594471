//! Library share endpoints

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::folder::FolderId;
use crate::domain::share::LibraryShare;
use crate::domain::user::UserId;

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub folder_id: String,
    pub grantee: String,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub id: String,
    pub folder_id: String,
    pub owner: String,
    pub grantee: String,
    pub created_at: String,
}

impl From<&LibraryShare> for ShareResponse {
    fn from(share: &LibraryShare) -> Self {
        Self {
            id: share.id().to_string(),
            folder_id: share.folder_id().as_str().to_string(),
            owner: share.owner().as_str().to_string(),
            grantee: share.grantee().as_str().to_string(),
            created_at: share.created_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListSharesResponse {
    pub shares: Vec<ShareResponse>,
    pub total: usize,
}

/// POST /v1/shares
pub async fn create_share(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreateShareRequest>,
) -> Result<Json<ShareResponse>, ApiError> {
    let folder_id = FolderId::new(request.folder_id)?;
    let grantee = UserId::new(request.grantee)?;
    debug!(folder = %folder_id, grantee = %grantee, "creating share");
    let share = state.shares.create(&user, &folder_id, &grantee).await?;
    Ok(Json(ShareResponse::from(&share)))
}

/// GET /v1/shares/granted — shares the caller has handed out.
pub async fn list_granted(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ListSharesResponse>, ApiError> {
    let shares = state.shares.granted_by(&user).await?;
    let shares: Vec<ShareResponse> = shares.iter().map(ShareResponse::from).collect();
    let total = shares.len();
    Ok(Json(ListSharesResponse { shares, total }))
}

/// GET /v1/shares/received — shares granted to the caller.
pub async fn list_received(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ListSharesResponse>, ApiError> {
    let shares = state.shares.granted_to(&user).await?;
    let shares: Vec<ShareResponse> = shares.iter().map(ShareResponse::from).collect();
    let total = shares.len();
    Ok(Json(ListSharesResponse { shares, total }))
}

/// DELETE /v1/shares/{share_id}
pub async fn revoke_share(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(share_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.shares.revoke(&user, &share_id).await?;
    Ok(Json(serde_json::json!({"revoked": true})))
}
