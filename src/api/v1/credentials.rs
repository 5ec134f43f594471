//! Provider credential endpoints
//!
//! Responses carry the masked hint only; the sealed key never leaves
//! the service layer.

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::credential::{CredentialId, IntegrationCredential, ProviderKind};

#[derive(Debug, Deserialize)]
pub struct CreateCredentialRequest {
    pub id: String,
    pub name: String,
    pub provider: ProviderKind,
    pub api_key: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RotateKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCredentialRequest {
    pub name: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub id: String,
    pub name: String,
    pub provider: ProviderKind,
    pub key_hint: String,
    pub endpoint: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&IntegrationCredential> for CredentialResponse {
    fn from(credential: &IntegrationCredential) -> Self {
        Self {
            id: credential.id().as_str().to_string(),
            name: credential.name().to_string(),
            provider: credential.provider(),
            key_hint: credential.key_hint().to_string(),
            endpoint: credential.endpoint().map(String::from),
            enabled: credential.enabled(),
            created_at: credential.created_at().to_rfc3339(),
            updated_at: credential.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListCredentialsResponse {
    pub credentials: Vec<CredentialResponse>,
    pub total: usize,
}

/// GET /v1/credentials
pub async fn list_credentials(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ListCredentialsResponse>, ApiError> {
    let credentials = state.credentials.list(&user).await?;
    let credentials: Vec<CredentialResponse> =
        credentials.iter().map(CredentialResponse::from).collect();
    let total = credentials.len();
    Ok(Json(ListCredentialsResponse { credentials, total }))
}

/// POST /v1/credentials
pub async fn create_credential(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreateCredentialRequest>,
) -> Result<Json<CredentialResponse>, ApiError> {
    debug!(credential = %request.id, provider = request.provider.as_str(), "creating credential");
    let id = CredentialId::new(request.id)?;
    let credential = state
        .credentials
        .create(
            &user,
            id,
            request.name,
            request.provider,
            &request.api_key,
            request.endpoint,
        )
        .await?;
    Ok(Json(CredentialResponse::from(&credential)))
}

/// GET /v1/credentials/{credential_id}
pub async fn get_credential(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(credential_id): Path<String>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let id = CredentialId::new(credential_id)?;
    let credential = state.credentials.get(&user, &id).await?;
    Ok(Json(CredentialResponse::from(&credential)))
}

/// PUT /v1/credentials/{credential_id}
pub async fn update_credential(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(credential_id): Path<String>,
    Json(request): Json<UpdateCredentialRequest>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let id = CredentialId::new(credential_id)?;
    let mut credential = state.credentials.get(&user, &id).await?;
    if let Some(name) = request.name {
        credential = state.credentials.rename(&user, &id, name).await?;
    }
    if let Some(enabled) = request.enabled {
        credential = state.credentials.set_enabled(&user, &id, enabled).await?;
    }
    Ok(Json(CredentialResponse::from(&credential)))
}

/// POST /v1/credentials/{credential_id}/rotate
pub async fn rotate_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(credential_id): Path<String>,
    Json(request): Json<RotateKeyRequest>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let id = CredentialId::new(credential_id)?;
    debug!(credential = %id, "rotating credential key");
    let credential = state.credentials.rotate_key(&user, &id, &request.api_key).await?;
    Ok(Json(CredentialResponse::from(&credential)))
}

/// DELETE /v1/credentials/{credential_id}
pub async fn delete_credential(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(credential_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = CredentialId::new(credential_id)?;
    state.credentials.delete(&user, &id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
