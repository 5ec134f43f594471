use std::sync::Arc;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::execution::WorkflowExecution;
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::domain::workflow::{Workflow, WorkflowId};

/// Read access to persisted workflow executions. Records are created by
/// [`WorkflowService::execute`](super::WorkflowService::execute); here they
/// can only be inspected and pruned by the workflow's owner.
#[derive(Debug)]
pub struct ExecutionService {
    executions: Arc<dyn Storage<WorkflowExecution>>,
    workflows: Arc<dyn Storage<Workflow>>,
}

impl ExecutionService {
    pub fn new(
        executions: Arc<dyn Storage<WorkflowExecution>>,
        workflows: Arc<dyn Storage<Workflow>>,
    ) -> Self {
        Self {
            executions,
            workflows,
        }
    }

    /// Executions of a workflow, newest first.
    pub async fn list(
        &self,
        owner: &UserId,
        workflow_id: &WorkflowId,
    ) -> DomainResult<Vec<WorkflowExecution>> {
        self.owned_workflow(owner, workflow_id).await?;
        let mut executions: Vec<WorkflowExecution> = self
            .executions
            .list()
            .await?
            .into_iter()
            .filter(|execution| execution.workflow_id() == workflow_id)
            .collect();
        executions.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        Ok(executions)
    }

    pub async fn get(&self, owner: &UserId, execution_id: &str) -> DomainResult<WorkflowExecution> {
        let execution = self
            .executions
            .get(&execution_id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("execution '{execution_id}'")))?;
        self.owned_workflow(owner, execution.workflow_id()).await?;
        Ok(execution)
    }

    pub async fn delete(&self, owner: &UserId, execution_id: &str) -> DomainResult<()> {
        self.get(owner, execution_id).await?;
        self.executions.delete(&execution_id.to_string()).await?;
        Ok(())
    }

    async fn owned_workflow(&self, owner: &UserId, id: &WorkflowId) -> DomainResult<Workflow> {
        let workflow = self
            .workflows
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("workflow '{id}'")))?;
        if workflow.owner() != owner {
            return Err(DomainError::forbidden(format!(
                "workflow '{id}' belongs to another user"
            )));
        }
        Ok(workflow)
    }
}
