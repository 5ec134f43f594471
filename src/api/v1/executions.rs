//! Workflow execution endpoints

use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::Value;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::execution::{StepRecord, WorkflowExecution};
use crate::domain::workflow::WorkflowId;

#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: String,
    pub workflow_id: String,
    pub workflow_version: u32,
    pub triggered_by: String,
    pub status: String,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub steps: Vec<StepRecord>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl From<&WorkflowExecution> for ExecutionResponse {
    fn from(execution: &WorkflowExecution) -> Self {
        Self {
            id: execution.id().to_string(),
            workflow_id: execution.workflow_id().as_str().to_string(),
            workflow_version: execution.workflow_version(),
            triggered_by: execution.triggered_by().as_str().to_string(),
            status: format!("{:?}", execution.status()).to_lowercase(),
            input: execution.input().clone(),
            output: execution.output().cloned(),
            error: execution.error().map(String::from),
            steps: execution.steps().to_vec(),
            started_at: execution.started_at().to_rfc3339(),
            finished_at: execution.finished_at().map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListExecutionsResponse {
    pub executions: Vec<ExecutionResponse>,
    pub total: usize,
}

/// GET /v1/workflows/{workflow_id}/executions
pub async fn list_executions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(workflow_id): Path<String>,
) -> Result<Json<ListExecutionsResponse>, ApiError> {
    let id = WorkflowId::new(workflow_id)?;
    let executions = state.executions.list(&user, &id).await?;
    let executions: Vec<ExecutionResponse> =
        executions.iter().map(ExecutionResponse::from).collect();
    let total = executions.len();
    Ok(Json(ListExecutionsResponse { executions, total }))
}

/// GET /v1/executions/{execution_id}
pub async fn get_execution(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(execution_id): Path<String>,
) -> Result<Json<ExecutionResponse>, ApiError> {
    let execution = state.executions.get(&user, &execution_id).await?;
    Ok(Json(ExecutionResponse::from(&execution)))
}

/// DELETE /v1/executions/{execution_id}
pub async fn delete_execution(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(execution_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.executions.delete(&user, &execution_id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
