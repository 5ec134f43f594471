use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::storage::StorageEntity;
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// The recorded result of a single step within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempts actually made, counting retries.
    pub attempts: u32,
    pub duration_ms: u64,
}

impl StepRecord {
    pub fn succeeded(step_name: impl Into<String>, output: Value, attempts: u32, duration_ms: u64) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Succeeded,
            output: Some(output),
            error: None,
            attempts,
            duration_ms,
        }
    }

    pub fn failed(step_name: impl Into<String>, error: impl Into<String>, attempts: u32, duration_ms: u64) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Failed,
            output: None,
            error: Some(error.into()),
            attempts,
            duration_ms,
        }
    }

    pub fn skipped(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Skipped,
            output: None,
            error: Some(error.into()),
            attempts: 1,
            duration_ms: 0,
        }
    }
}

/// The result an executor hands back for one run, before it is folded
/// into the stored [`WorkflowExecution`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<StepRecord>,
}

impl RunOutcome {
    pub fn success(output: Option<Value>, steps: Vec<StepRecord>) -> Self {
        Self {
            success: true,
            output,
            error: None,
            steps,
        }
    }

    pub fn failure(error: impl Into<String>, steps: Vec<StepRecord>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            steps,
        }
    }
}

/// A persisted record of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    id: String,
    workflow_id: WorkflowId,
    /// Step definition version the run executed against.
    workflow_version: u32,
    triggered_by: UserId,
    status: ExecutionStatus,
    input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    steps: Vec<StepRecord>,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(workflow_id: WorkflowId, workflow_version: u32, triggered_by: UserId, input: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id,
            workflow_version,
            triggered_by,
            status: ExecutionStatus::Pending,
            input,
            output: None,
            error: None,
            steps: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn workflow_version(&self) -> u32 {
        self.workflow_version
    }

    pub fn triggered_by(&self) -> &UserId {
        &self.triggered_by
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.status = if outcome.success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        self.output = outcome.output;
        self.error = outcome.error;
        self.steps = outcome.steps;
        self.finished_at = Some(Utc::now());
    }
}

impl StorageEntity for WorkflowExecution {
    type Key = String;
    const COLLECTION: &'static str = "workflow_executions";

    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execution_lifecycle() {
        let mut execution = WorkflowExecution::new(
            WorkflowId::new("w").unwrap(),
            3,
            UserId::new("alice").unwrap(),
            json!({"q": 1}),
        );
        assert_eq!(execution.status(), ExecutionStatus::Pending);

        execution.mark_running();
        assert_eq!(execution.status(), ExecutionStatus::Running);

        execution.finish(RunOutcome::success(
            Some(json!("done")),
            vec![StepRecord::succeeded("only", json!("done"), 1, 12)],
        ));
        assert_eq!(execution.status(), ExecutionStatus::Completed);
        assert!(execution.finished_at().is_some());
        assert_eq!(execution.steps().len(), 1);
    }

    #[test]
    fn test_failed_outcome_marks_failed() {
        let mut execution = WorkflowExecution::new(
            WorkflowId::new("w").unwrap(),
            1,
            UserId::new("alice").unwrap(),
            json!({}),
        );
        execution.mark_running();
        execution.finish(RunOutcome::failure(
            "step 'call' failed",
            vec![StepRecord::failed("call", "provider down", 3, 840)],
        ));
        assert_eq!(execution.status(), ExecutionStatus::Failed);
        assert_eq!(execution.error(), Some("step 'call' failed"));
        assert_eq!(execution.steps()[0].attempts, 3);
    }
}
