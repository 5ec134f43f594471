use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::execution::{RunOutcome, WorkflowExecution};
use crate::domain::prompt::{Prompt, PromptId};
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::domain::workflow::{
    StepType, Workflow, WorkflowContext, WorkflowExecutor, WorkflowId, WorkflowStep,
};

/// The dry run of a single prompt step: the bindings after expression
/// resolution and the rendered prompt text. Nothing is persisted and no
/// provider is called.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptStepPreview {
    pub prompt_id: PromptId,
    pub variables: HashMap<String, String>,
    pub rendered: String,
}

/// Fields accepted on workflow update. `None` leaves the field untouched.
#[derive(Debug, Default)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub steps: Option<Vec<WorkflowStep>>,
    pub enabled: Option<bool>,
}

/// Workflow CRUD and execution. Running a workflow persists a
/// [`WorkflowExecution`] record through its whole lifecycle, so a crash
/// mid-run leaves a `running` record behind as evidence.
#[derive(Debug)]
pub struct WorkflowService {
    workflows: Arc<dyn Storage<Workflow>>,
    prompts: Arc<dyn Storage<Prompt>>,
    executions: Arc<dyn Storage<WorkflowExecution>>,
    executor: Arc<dyn WorkflowExecutor>,
}

impl WorkflowService {
    pub fn new(
        workflows: Arc<dyn Storage<Workflow>>,
        prompts: Arc<dyn Storage<Prompt>>,
        executions: Arc<dyn Storage<WorkflowExecution>>,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> Self {
        Self {
            workflows,
            prompts,
            executions,
            executor,
        }
    }

    pub async fn create(
        &self,
        owner: &UserId,
        id: WorkflowId,
        name: String,
        description: Option<String>,
        steps: Vec<WorkflowStep>,
    ) -> DomainResult<Workflow> {
        if self.workflows.exists(&id).await? {
            return Err(DomainError::conflict(format!(
                "workflow '{id}' already exists"
            )));
        }
        let mut workflow = Workflow::new(id, name, owner.clone())?.with_steps(steps);
        if let Some(description) = description {
            workflow = workflow.with_description(description);
        }
        workflow.validate()?;
        self.check_prompt_refs(&workflow).await?;
        self.workflows.put(&workflow).await?;
        info!(workflow = %workflow.id(), steps = workflow.steps().len(), "created workflow");
        Ok(workflow)
    }

    pub async fn get(&self, owner: &UserId, id: &WorkflowId) -> DomainResult<Workflow> {
        self.owned(owner, id).await
    }

    pub async fn list(&self, owner: &UserId) -> DomainResult<Vec<Workflow>> {
        let mut workflows: Vec<Workflow> = self
            .workflows
            .list()
            .await?
            .into_iter()
            .filter(|workflow| workflow.owner() == owner)
            .collect();
        workflows.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(workflows)
    }

    pub async fn update(
        &self,
        owner: &UserId,
        id: &WorkflowId,
        update: WorkflowUpdate,
    ) -> DomainResult<Workflow> {
        let mut workflow = self.owned(owner, id).await?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("workflow name cannot be empty"));
            }
            workflow.set_name(name);
        }
        if let Some(description) = update.description {
            workflow.set_description(description);
        }
        if let Some(steps) = update.steps {
            workflow.set_steps(steps);
        }
        if let Some(enabled) = update.enabled {
            workflow.set_enabled(enabled);
        }
        workflow.validate()?;
        self.check_prompt_refs(&workflow).await?;
        self.workflows.put(&workflow).await?;
        Ok(workflow)
    }

    /// Deletes a workflow together with its execution history.
    pub async fn delete(&self, owner: &UserId, id: &WorkflowId) -> DomainResult<()> {
        self.owned(owner, id).await?;
        for execution in self.executions.list().await? {
            if execution.workflow_id() == id {
                self.executions.delete(&execution.id().to_string()).await?;
            }
        }
        self.workflows.delete(id).await?;
        info!(workflow = %id, "deleted workflow");
        Ok(())
    }

    /// Runs the workflow against the given input and persists the
    /// execution record through pending, running and its final state.
    pub async fn execute(
        &self,
        owner: &UserId,
        id: &WorkflowId,
        input: Value,
    ) -> DomainResult<WorkflowExecution> {
        let workflow = self.owned(owner, id).await?;
        if !workflow.enabled() {
            return Err(DomainError::conflict(format!("workflow '{id}' is disabled")));
        }

        let mut execution =
            WorkflowExecution::new(id.clone(), workflow.version(), owner.clone(), input.clone());
        self.executions.put(&execution).await?;

        execution.mark_running();
        self.executions.put(&execution).await?;

        // An executor error still terminates the record; it must never
        // stay in running.
        let outcome = match self.executor.run(&workflow, input).await {
            Ok(outcome) => outcome,
            Err(err) => RunOutcome::failure(err.to_string(), Vec::new()),
        };
        execution.finish(outcome);
        self.executions.put(&execution).await?;
        info!(
            workflow = %id,
            execution = execution.id(),
            status = ?execution.status(),
            "workflow execution finished"
        );
        Ok(execution)
    }

    /// Dry-runs one prompt step: resolves its variable bindings against a
    /// sample input and renders the prompt, without calling any provider
    /// or recording an execution.
    pub async fn preview_step(
        &self,
        owner: &UserId,
        id: &WorkflowId,
        step_name: &str,
        input: Value,
    ) -> DomainResult<PromptStepPreview> {
        let workflow = self.owned(owner, id).await?;
        let step = workflow
            .steps()
            .iter()
            .find(|step| step.name == step_name)
            .ok_or_else(|| {
                DomainError::not_found(format!("step '{step_name}' in workflow '{id}'"))
            })?;
        let StepType::Prompt(prompt_step) = &step.step_type else {
            return Err(DomainError::validation(format!(
                "step '{step_name}' is not a prompt step"
            )));
        };

        let context = WorkflowContext::new(input);
        let mut variables = HashMap::new();
        for (name, binding) in &prompt_step.variables {
            variables.insert(name.clone(), context.resolve_string(binding)?);
        }

        let prompt = self
            .prompts
            .get(&prompt_step.prompt_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("prompt '{}'", prompt_step.prompt_id))
            })?;
        let rendered = prompt.render(&variables)?;
        Ok(PromptStepPreview {
            prompt_id: prompt_step.prompt_id.clone(),
            variables,
            rendered,
        })
    }

    /// Every prompt step must point at an existing prompt.
    async fn check_prompt_refs(&self, workflow: &Workflow) -> DomainResult<()> {
        for step in workflow.steps() {
            if let StepType::Prompt(prompt_step) = &step.step_type {
                if !self.prompts.exists(&prompt_step.prompt_id).await? {
                    return Err(DomainError::validation(format!(
                        "step '{}' references unknown prompt '{}'",
                        step.name, prompt_step.prompt_id
                    )));
                }
            }
        }
        Ok(())
    }

    async fn owned(&self, owner: &UserId, id: &WorkflowId) -> DomainResult<Workflow> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::domain::execution::{ExecutionStatus, RunOutcome, StepRecord};
    use crate::domain::prompt::Variable;
    use crate::domain::workflow::{ModelRoute, PromptStep, TransformOp, TransformStep};
    use crate::infrastructure::storage::InMemoryStorage;

    #[derive(Debug)]
    struct FixedExecutor {
        outcome: RunOutcome,
    }

    #[async_trait]
    impl WorkflowExecutor for FixedExecutor {
        async fn run(&self, _workflow: &Workflow, _input: Value) -> DomainResult<RunOutcome> {
            Ok(self.outcome.clone())
        }
    }

    #[derive(Debug)]
    struct ErroringExecutor;

    #[async_trait]
    impl WorkflowExecutor for ErroringExecutor {
        async fn run(&self, _workflow: &Workflow, _input: Value) -> DomainResult<RunOutcome> {
            Err(DomainError::internal("executor blew up"))
        }
    }

    struct Fixture {
        service: WorkflowService,
        prompts: Arc<InMemoryStorage<Prompt>>,
        executions: Arc<InMemoryStorage<WorkflowExecution>>,
    }

    fn fixture_with_executor(executor: Arc<dyn WorkflowExecutor>) -> Fixture {
        let workflows = Arc::new(InMemoryStorage::new());
        let prompts = Arc::new(InMemoryStorage::new());
        let executions = Arc::new(InMemoryStorage::new());
        Fixture {
            service: WorkflowService::new(
                workflows,
                prompts.clone(),
                executions.clone(),
                executor,
            ),
            prompts,
            executions,
        }
    }

    fn fixture_with(outcome: RunOutcome) -> Fixture {
        fixture_with_executor(Arc::new(FixedExecutor { outcome }))
    }

    fn fixture() -> Fixture {
        fixture_with(RunOutcome::success(
            Some(json!({"content": "done"})),
            vec![StepRecord::succeeded("only", json!({"content": "done"}), 1, 5)],
        ))
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn wid() -> WorkflowId {
        WorkflowId::new("pipeline").unwrap()
    }

    async fn seed_prompt(fx: &Fixture) {
        let prompt = Prompt::new(
            PromptId::new("summarize").unwrap(),
            "Summarize",
            "Summarize: {{text}}",
            alice(),
        )
        .unwrap()
        .with_variables(vec![Variable::text("text").required()]);
        fx.prompts.put(&prompt).await.unwrap();
    }

    fn prompt_step() -> WorkflowStep {
        WorkflowStep::new(
            "only",
            StepType::Prompt(PromptStep {
                prompt_id: PromptId::new("summarize").unwrap(),
                variables: HashMap::from([("text".to_string(), "{{input.text}}".to_string())]),
                routes: vec![ModelRoute {
                    provider: crate::domain::credential::ProviderKind::OpenAi,
                    model: "gpt-4o".into(),
                    credential_id: crate::domain::credential::CredentialId::new("main").unwrap(),
                    retries: 0,
                }],
                routing: Default::default(),
                temperature: None,
                max_tokens: None,
            }),
        )
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_prompt_ref() {
        let fx = fixture();
        let result = fx
            .service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_execute_persists_lifecycle() {
        let fx = fixture();
        seed_prompt(&fx).await;
        fx.service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await
            .unwrap();

        let execution = fx
            .service
            .execute(&alice(), &wid(), json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(execution.status(), ExecutionStatus::Completed);
        assert_eq!(execution.steps().len(), 1);
        assert!(execution.finished_at().is_some());

        let stored = fx.executions.get(&execution.id().to_string()).await.unwrap().unwrap();
        assert_eq!(stored.status(), ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_execute_records_failure() {
        let fx = fixture_with(RunOutcome::failure(
            "step 'only' failed",
            vec![StepRecord::failed("only", "boom", 1, 5)],
        ));
        seed_prompt(&fx).await;
        fx.service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await
            .unwrap();

        let execution = fx
            .service
            .execute(&alice(), &wid(), json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(execution.status(), ExecutionStatus::Failed);
        assert_eq!(execution.error(), Some("step 'only' failed"));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_steps() {
        let fx = fixture();
        let result = fx
            .service
            .create(&alice(), wid(), "P".into(), None, Vec::new())
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(fx.executions.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_executor_error_still_finishes_execution() {
        let fx = fixture_with_executor(Arc::new(ErroringExecutor));
        seed_prompt(&fx).await;
        fx.service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await
            .unwrap();

        let execution = fx
            .service
            .execute(&alice(), &wid(), json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(execution.status(), ExecutionStatus::Failed);
        assert!(execution.error().unwrap().contains("executor blew up"));
        assert!(execution.finished_at().is_some());

        let stored = fx.executions.get(&execution.id().to_string()).await.unwrap().unwrap();
        assert_eq!(stored.status(), ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_execute_refuses_disabled_workflow() {
        let fx = fixture();
        seed_prompt(&fx).await;
        fx.service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await
            .unwrap();
        fx.service
            .update(
                &alice(),
                &wid(),
                WorkflowUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            fx.service.execute(&alice(), &wid(), json!({})).await,
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(fx.executions.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_steps_bumps_version() {
        let fx = fixture();
        seed_prompt(&fx).await;
        let created = fx
            .service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await
            .unwrap();
        let before = created.version();

        let updated = fx
            .service
            .update(
                &alice(),
                &wid(),
                WorkflowUpdate {
                    steps: Some(vec![
                        prompt_step(),
                        WorkflowStep::new(
                            "shout",
                            StepType::Transform(TransformStep {
                                input: "{{steps.only.content}}".into(),
                                op: TransformOp::Uppercase,
                            }),
                        ),
                    ]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version(), before + 1);
    }

    #[tokio::test]
    async fn test_preview_resolves_and_renders() {
        let fx = fixture();
        seed_prompt(&fx).await;
        fx.service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await
            .unwrap();

        let preview = fx
            .service
            .preview_step(&alice(), &wid(), "only", json!({"text": "the article"}))
            .await
            .unwrap();
        assert_eq!(preview.rendered, "Summarize: the article");
        assert_eq!(preview.variables["text"], "the article");
        assert_eq!(fx.executions.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_preview_rejects_non_prompt_step() {
        let fx = fixture();
        seed_prompt(&fx).await;
        fx.service
            .create(
                &alice(),
                wid(),
                "P".into(),
                None,
                vec![
                    prompt_step(),
                    WorkflowStep::new(
                        "shout",
                        StepType::Transform(TransformStep {
                            input: "{{steps.only.content}}".into(),
                            op: TransformOp::Uppercase,
                        }),
                    ),
                ],
            )
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .preview_step(&alice(), &wid(), "shout", json!({}))
                .await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_executions() {
        let fx = fixture();
        seed_prompt(&fx).await;
        fx.service
            .create(&alice(), wid(), "P".into(), None, vec![prompt_step()])
            .await
            .unwrap();
        fx.service
            .execute(&alice(), &wid(), json!({"text": "x"}))
            .await
            .unwrap();
        assert_eq!(fx.executions.count().await.unwrap(), 1);

        fx.service.delete(&alice(), &wid()).await.unwrap();
        assert_eq!(fx.executions.count().await.unwrap(), 0);
    }
}
