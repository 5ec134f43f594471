//! Workflow endpoints

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::api::v1::executions::ExecutionResponse;
use crate::domain::workflow::{Workflow, WorkflowId, WorkflowStep};
use crate::infrastructure::services::WorkflowUpdate;

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    /// Omitted leaves the description alone; explicit `null` clears it.
    #[serde(default)]
    pub description: Option<Option<String>>,
    pub steps: Option<Vec<WorkflowStep>>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteWorkflowRequest {
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Deserialize)]
pub struct PreviewStepRequest {
    pub step: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub steps: Vec<WorkflowStep>,
    pub enabled: bool,
    pub version: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Workflow> for WorkflowResponse {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id().as_str().to_string(),
            name: workflow.name().to_string(),
            description: workflow.description().map(String::from),
            owner: workflow.owner().as_str().to_string(),
            steps: workflow.steps().to_vec(),
            enabled: workflow.enabled(),
            version: workflow.version(),
            created_at: workflow.created_at().to_rfc3339(),
            updated_at: workflow.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListWorkflowsResponse {
    pub workflows: Vec<WorkflowResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PreviewStepResponse {
    pub prompt_id: String,
    pub variables: std::collections::HashMap<String, String>,
    pub rendered: String,
}

/// GET /v1/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ListWorkflowsResponse>, ApiError> {
    let workflows = state.workflows.list(&user).await?;
    let workflows: Vec<WorkflowResponse> = workflows.iter().map(WorkflowResponse::from).collect();
    let total = workflows.len();
    Ok(Json(ListWorkflowsResponse { workflows, total }))
}

/// POST /v1/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreateWorkflowRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    debug!(workflow = %request.id, "creating workflow");
    let id = WorkflowId::new(request.id)?;
    let workflow = state
        .workflows
        .create(&user, id, request.name, request.description, request.steps)
        .await?;
    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// GET /v1/workflows/{workflow_id}
pub async fn get_workflow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let id = WorkflowId::new(workflow_id)?;
    let workflow = state.workflows.get(&user, &id).await?;
    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// PUT /v1/workflows/{workflow_id}
pub async fn update_workflow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(workflow_id): Path<String>,
    Json(request): Json<UpdateWorkflowRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let id = WorkflowId::new(workflow_id)?;
    let workflow = state
        .workflows
        .update(
            &user,
            &id,
            WorkflowUpdate {
                name: request.name,
                description: request.description,
                steps: request.steps,
                enabled: request.enabled,
            },
        )
        .await?;
    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// DELETE /v1/workflows/{workflow_id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(workflow_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = WorkflowId::new(workflow_id)?;
    state.workflows.delete(&user, &id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}

/// POST /v1/workflows/{workflow_id}/execute
pub async fn execute_workflow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(workflow_id): Path<String>,
    Json(request): Json<ExecuteWorkflowRequest>,
) -> Result<Json<ExecutionResponse>, ApiError> {
    let id = WorkflowId::new(workflow_id)?;
    debug!(workflow = %id, "executing workflow");
    let execution = state.workflows.execute(&user, &id, request.input).await?;
    Ok(Json(ExecutionResponse::from(&execution)))
}

/// POST /v1/workflows/{workflow_id}/preview
pub async fn preview_step(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(workflow_id): Path<String>,
    Json(request): Json<PreviewStepRequest>,
) -> Result<Json<PreviewStepResponse>, ApiError> {
    let id = WorkflowId::new(workflow_id)?;
    let preview = state
        .workflows
        .preview_step(&user, &id, &request.step, request.input)
        .await?;
    Ok(Json(PreviewStepResponse {
        prompt_id: preview.prompt_id.as_str().to_string(),
        variables: preview.variables,
        rendered: preview.rendered,
    }))
}
