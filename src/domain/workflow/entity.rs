use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::slug::validate_slug;
use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::user::UserId;
use crate::domain::workflow::step_types::StepType;

pub const MAX_STEPS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        validate_slug("workflow", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkflowId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkflowId> for String {
    fn from(id: WorkflowId) -> Self {
        id.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for WorkflowId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// What the executor does when a step fails after its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorAction {
    #[default]
    FailWorkflow,
    SkipStep,
}

/// A named step in a workflow. Names are unique within the workflow and
/// are how branches and `{{steps.name.*}}` references address each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    #[serde(flatten)]
    pub step_type: StepType,
    #[serde(default)]
    pub on_error: OnErrorAction,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            name: name.into(),
            step_type,
            on_error: OnErrorAction::default(),
        }
    }

    pub fn with_on_error(mut self, on_error: OnErrorAction) -> Self {
        self.on_error = on_error;
        self
    }
}

/// An ordered multi-step automation owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    owner: UserId,
    steps: Vec<WorkflowStep>,
    /// Disabled workflows refuse to execute but stay editable.
    #[serde(default = "enabled_default")]
    enabled: bool,
    /// Incremented on every step change.
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: WorkflowId, name: impl Into<String>, owner: UserId) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("workflow name cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            name,
            description: None,
            owner,
            steps: Vec::new(),
            enabled: true,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_steps(mut self, steps: Vec<WorkflowStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.touch();
    }

    pub fn set_steps(&mut self, steps: Vec<WorkflowStep>) {
        self.steps = steps;
        self.version += 1;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Checks the step list is coherent: names unique and non-empty,
    /// branch targets exist, per-step configs valid.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("workflow name cannot be empty"));
        }
        if self.steps.is_empty() {
            return Err(DomainError::validation("workflow needs at least one step"));
        }
        if self.steps.len() > MAX_STEPS {
            return Err(DomainError::validation(format!(
                "workflow cannot exceed {MAX_STEPS} steps"
            )));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "step {index} has an empty name"
                )));
            }
            if self.steps[..index].iter().any(|prior| prior.name == step.name) {
                return Err(DomainError::validation(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
            step.step_type.validate()?;
            for target in step.step_type.branch_targets() {
                if self.step_index(target).is_none() {
                    return Err(DomainError::validation(format!(
                        "step '{}' jumps to unknown step '{target}'",
                        step.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn enabled_default() -> bool {
    true
}

impl StorageEntity for Workflow {
    type Key = WorkflowId;
    const COLLECTION: &'static str = "workflows";

    fn storage_key(&self) -> WorkflowId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::step_types::{
        BranchAction, ConditionOperator, ConditionStep, DelayStep,
    };

    fn owner() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn delay(name: &str) -> WorkflowStep {
        WorkflowStep::new(name, StepType::Delay(DelayStep { duration_ms: 10 }))
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W", owner())
            .unwrap()
            .with_steps(vec![delay("a"), delay("a")]);
        assert!(workflow.validate().unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_branch_target_rejected() {
        let condition = WorkflowStep::new(
            "check",
            StepType::Condition(ConditionStep {
                field: "{{input.x}}".to_string(),
                operator: ConditionOperator::IsEmpty,
                value: None,
                then: BranchAction::GoToStep { step: "ghost".to_string() },
                otherwise: BranchAction::Continue,
            }),
        );
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W", owner())
            .unwrap()
            .with_steps(vec![condition]);
        assert!(workflow.validate().unwrap_err().to_string().contains("ghost"));
    }

    #[test]
    fn test_set_steps_bumps_version() {
        let mut workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W", owner()).unwrap();
        assert_eq!(workflow.version(), 1);
        workflow.set_steps(vec![delay("a")]);
        assert_eq!(workflow.version(), 2);
    }

    #[test]
    fn test_step_serde_flattens_type() {
        let step = delay("wait");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["name"], "wait");
        assert_eq!(json["type"], "delay");
        let back: WorkflowStep = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_empty_step_list_rejected() {
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W", owner()).unwrap();
        assert!(
            workflow
                .validate()
                .unwrap_err()
                .to_string()
                .contains("at least one step")
        );
    }

    #[test]
    fn test_valid_workflow_passes() {
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W", owner())
            .unwrap()
            .with_steps(vec![delay("a"), delay("b")]);
        assert!(workflow.validate().is_ok());
    }
}
