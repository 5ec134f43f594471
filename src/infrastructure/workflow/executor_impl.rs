use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::execution::{RunOutcome, StepRecord};
use crate::domain::llm::{ChatMessage, LlmRequest, LlmResponse};
use crate::domain::prompt::Prompt;
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::domain::workflow::{
    BranchAction, ConditionStep, DecisionStep, DelayStep, OnErrorAction, PromptStep, RoutingMode,
    StepType, TransformOp, TransformStep, WebhookStep, Workflow, WorkflowContext,
    WorkflowExecutor, WorkflowStep, step_types::ModelRoute,
};
use crate::infrastructure::credential::CredentialResolver;
use crate::infrastructure::llm::factory::ProviderFactory;
use crate::infrastructure::llm::http_client::HttpClientTrait;

/// Hard cap on step transitions per run, so a `go_to_step` cycle cannot
/// spin forever.
const MAX_TRANSITIONS: usize = 200;

/// Where execution goes after a step completes.
enum Control {
    Continue,
    GoTo(String),
    End(Option<Value>),
}

impl From<&BranchAction> for Control {
    fn from(action: &BranchAction) -> Self {
        match action {
            BranchAction::Continue => Control::Continue,
            BranchAction::GoToStep { step } => Control::GoTo(step.clone()),
            BranchAction::EndWorkflow { output } => Control::End(output.clone()),
        }
    }
}

struct StepSuccess {
    output: Value,
    control: Control,
}

/// Step-machine executor: walks the step list, keeps a [`WorkflowContext`]
/// of step outputs, and drives prompt steps through the provider stack.
#[derive(Debug)]
pub struct StepWorkflowExecutor {
    prompts: Arc<dyn Storage<Prompt>>,
    credentials: Arc<dyn CredentialResolver>,
    providers: Arc<dyn ProviderFactory>,
    http: Arc<dyn HttpClientTrait>,
}

impl StepWorkflowExecutor {
    pub fn new(
        prompts: Arc<dyn Storage<Prompt>>,
        credentials: Arc<dyn CredentialResolver>,
        providers: Arc<dyn ProviderFactory>,
        http: Arc<dyn HttpClientTrait>,
    ) -> Self {
        Self {
            prompts,
            credentials,
            providers,
            http,
        }
    }

    async fn run_step(
        &self,
        owner: &UserId,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> (u32, DomainResult<StepSuccess>) {
        match &step.step_type {
            StepType::Prompt(prompt_step) => self.run_prompt(owner, prompt_step, context).await,
            StepType::Condition(condition) => (1, self.run_condition(condition, context)),
            StepType::Transform(transform) => (1, run_transform(transform, context)),
            StepType::Delay(delay) => (1, run_delay(delay).await),
            StepType::Webhook(webhook) => (1, self.run_webhook(webhook, context).await),
            StepType::Decision(decision) => (1, self.run_decision(decision, context)),
        }
    }

    async fn run_prompt(
        &self,
        owner: &UserId,
        step: &PromptStep,
        context: &WorkflowContext,
    ) -> (u32, DomainResult<StepSuccess>) {
        let request = match self.build_llm_request(step, context).await {
            Ok(request) => request,
            Err(err) => return (1, Err(err)),
        };

        match step.routing {
            RoutingMode::Fallback => {
                let mut attempts = 0;
                let mut failures = Vec::new();
                for route in &step.routes {
                    let (route_attempts, result) =
                        self.call_route(owner, route, &request).await;
                    attempts += route_attempts;
                    match result {
                        Ok(response) => {
                            return (
                                attempts,
                                Ok(StepSuccess {
                                    output: prompt_output(route, &response, &failures),
                                    control: Control::Continue,
                                }),
                            );
                        }
                        Err(err) => {
                            warn!(
                                provider = route.provider.as_str(),
                                model = %route.model,
                                error = %err,
                                "route failed, trying next"
                            );
                            failures.push(route_failure(route, &err));
                        }
                    }
                }
                (
                    attempts,
                    Err(DomainError::provider(format!(
                        "all {} route(s) failed",
                        step.routes.len()
                    ))),
                )
            }
            RoutingMode::Parallel => {
                let calls = step
                    .routes
                    .iter()
                    .map(|route| self.call_route(owner, route, &request));
                let results = join_all(calls).await;
                let attempts = results.iter().map(|(n, _)| *n).sum();
                let mut failures = Vec::new();
                let mut winner = None;
                for (route, (_, result)) in step.routes.iter().zip(&results) {
                    match result {
                        Ok(response) if winner.is_none() => {
                            winner = Some((route, response.clone()));
                        }
                        Ok(_) => {}
                        Err(err) => failures.push(route_failure(route, err)),
                    }
                }
                match winner {
                    Some((route, response)) => (
                        attempts,
                        Ok(StepSuccess {
                            output: prompt_output(route, &response, &failures),
                            control: Control::Continue,
                        }),
                    ),
                    None => (
                        attempts,
                        Err(DomainError::provider(format!(
                            "all {} route(s) failed",
                            step.routes.len()
                        ))),
                    ),
                }
            }
        }
    }

    async fn build_llm_request(
        &self,
        step: &PromptStep,
        context: &WorkflowContext,
    ) -> DomainResult<LlmRequest> {
        let prompt = self
            .prompts
            .get(&step.prompt_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("prompt '{}'", step.prompt_id)))?;

        let mut values = HashMap::new();
        for (name, binding) in &step.variables {
            values.insert(name.clone(), context.resolve_string(binding)?);
        }
        let rendered = prompt.render(&values)?;

        // Model is filled in per route.
        let mut request = LlmRequest::new(String::new(), vec![ChatMessage::user(rendered)]);
        if let Some(temperature) = step.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = step.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        Ok(request)
    }

    /// One route with its retry budget. Returns the attempts made.
    async fn call_route(
        &self,
        owner: &UserId,
        route: &ModelRoute,
        request: &LlmRequest,
    ) -> (u32, DomainResult<LlmResponse>) {
        let credential = match self.credentials.resolve(&route.credential_id, owner).await {
            Ok(credential) => credential,
            Err(err) => return (1, Err(err)),
        };
        if credential.provider != route.provider {
            return (
                1,
                Err(DomainError::validation(format!(
                    "credential '{}' is for {}, route expects {}",
                    route.credential_id, credential.provider, route.provider
                ))),
            );
        }
        let provider = match self.providers.create(
            route.provider,
            &credential.api_key,
            credential.endpoint.as_deref(),
        ) {
            Ok(provider) => provider,
            Err(err) => return (1, Err(err)),
        };

        let mut request = request.clone();
        request.model = route.model.clone();
        let mut attempts = 0;
        let mut last_error = None;
        while attempts <= route.retries {
            attempts += 1;
            match provider.complete(&request).await {
                Ok(response) => return (attempts, Ok(response)),
                Err(err) => {
                    debug!(
                        provider = route.provider.as_str(),
                        model = %route.model,
                        attempt = attempts,
                        error = %err,
                        "completion attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }
        (
            attempts,
            Err(last_error
                .unwrap_or_else(|| DomainError::provider("route made no attempts"))),
        )
    }

    fn run_condition(
        &self,
        step: &ConditionStep,
        context: &WorkflowContext,
    ) -> DomainResult<StepSuccess> {
        let actual = resolve_predicate_field(&step.field, step.operator.needs_value(), context)?;
        let matched = step.operator.evaluate(&actual, step.value.as_deref())?;
        let action = if matched { &step.then } else { &step.otherwise };
        Ok(StepSuccess {
            output: json!({"matched": matched}),
            control: action.into(),
        })
    }

    fn run_decision(
        &self,
        step: &DecisionStep,
        context: &WorkflowContext,
    ) -> DomainResult<StepSuccess> {
        for (index, arm) in step.arms.iter().enumerate() {
            let actual =
                resolve_predicate_field(&arm.field, arm.operator.needs_value(), context)?;
            if arm.operator.evaluate(&actual, arm.value.as_deref())? {
                return Ok(StepSuccess {
                    output: json!({"matched_arm": index}),
                    control: (&arm.then).into(),
                });
            }
        }
        Ok(StepSuccess {
            output: json!({"matched_arm": Value::Null}),
            control: (&step.default_action).into(),
        })
    }

    async fn run_webhook(
        &self,
        step: &WebhookStep,
        context: &WorkflowContext,
    ) -> DomainResult<StepSuccess> {
        let url = context.resolve_string(&step.url)?;
        let mut headers = Vec::with_capacity(step.headers.len());
        for (name, value) in &step.headers {
            headers.push((name.clone(), context.resolve_string(value)?));
        }
        let body = match &step.body {
            Some(body) => Some(context.resolve_value(body)?),
            None => None,
        };

        let response = self
            .http
            .request(step.method, &url, &headers, body.as_ref())
            .await?;
        if !response.is_success() && step.fail_on_error {
            return Err(DomainError::provider(format!(
                "webhook returned status {}: {}",
                response.status, response.body
            )));
        }
        Ok(StepSuccess {
            output: json!({"status": response.status, "body": response.body}),
            control: Control::Continue,
        })
    }
}

/// Missing references count as null for the emptiness operators; every
/// other operator needs the field to resolve.
fn resolve_predicate_field(
    field: &str,
    needs_value: bool,
    context: &WorkflowContext,
) -> DomainResult<Value> {
    match context.resolve_expression(field) {
        Ok(value) => Ok(value),
        Err(_) if !needs_value => Ok(Value::Null),
        Err(err) => Err(err),
    }
}

fn run_transform(step: &TransformStep, context: &WorkflowContext) -> DomainResult<StepSuccess> {
    if let TransformOp::Template { template } = &step.op {
        return Ok(StepSuccess {
            output: Value::String(context.resolve_string(template)?),
            control: Control::Continue,
        });
    }
    let input = context.resolve_expression(&step.input)?;
    let output = match &step.op {
        TransformOp::ExtractPath { path } => dig(&input, path)?,
        TransformOp::Uppercase => Value::String(as_text(&input).to_uppercase()),
        TransformOp::Lowercase => Value::String(as_text(&input).to_lowercase()),
        TransformOp::Trim => Value::String(as_text(&input).trim().to_string()),
        TransformOp::ParseJson => {
            let text = match &input {
                Value::String(s) => s.clone(),
                other => {
                    return Err(DomainError::validation(format!(
                        "parse_json expects a string, got {other}"
                    )));
                }
            };
            serde_json::from_str(&text)
                .map_err(|err| DomainError::validation(format!("parse_json failed: {err}")))?
        }
        // Handled above.
        TransformOp::Template { .. } => unreachable!(),
    };
    Ok(StepSuccess {
        output,
        control: Control::Continue,
    })
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn dig(value: &Value, path: &str) -> DomainResult<Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(|| DomainError::validation(format!("path '{path}' not found in value")))?;
    }
    Ok(current.clone())
}

async fn run_delay(step: &DelayStep) -> DomainResult<StepSuccess> {
    tokio::time::sleep(Duration::from_millis(step.duration_ms)).await;
    Ok(StepSuccess {
        output: json!({"delayed_ms": step.duration_ms}),
        control: Control::Continue,
    })
}

fn prompt_output(route: &ModelRoute, response: &LlmResponse, failures: &[Value]) -> Value {
    let mut output = json!({
        "content": response.content,
        "model": response.model,
        "provider": route.provider.as_str(),
    });
    if let Some(usage) = &response.usage {
        output["usage"] = json!({
            "prompt_tokens": usage.prompt_tokens,
            "completion_tokens": usage.completion_tokens,
            "total_tokens": usage.total_tokens,
        });
    }
    if !failures.is_empty() {
        output["failed_routes"] = Value::Array(failures.to_vec());
    }
    output
}

fn route_failure(route: &ModelRoute, error: &DomainError) -> Value {
    json!({
        "provider": route.provider.as_str(),
        "model": route.model,
        "error": error.to_string(),
    })
}

#[async_trait]
impl WorkflowExecutor for StepWorkflowExecutor {
    async fn run(&self, workflow: &Workflow, input: Value) -> DomainResult<RunOutcome> {
        workflow.validate()?;
        if workflow.steps().is_empty() {
            return Err(DomainError::validation("workflow has no steps"));
        }

        let mut context = WorkflowContext::new(input);
        let mut records = Vec::new();
        let mut final_output: Option<Value> = None;
        let mut index = 0;
        let mut transitions = 0;

        while index < workflow.steps().len() {
            transitions += 1;
            if transitions > MAX_TRANSITIONS {
                return Ok(RunOutcome::failure(
                    format!("aborted after {MAX_TRANSITIONS} step transitions (cycle?)"),
                    records,
                ));
            }
            let step = &workflow.steps()[index];
            debug!(workflow = %workflow.id(), step = %step.name, "running step");

            let started = Instant::now();
            let (attempts, result) = self.run_step(workflow.owner(), step, &context).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(success) => {
                    context.set_step_output(&step.name, success.output.clone());
                    records.push(StepRecord::succeeded(
                        &step.name,
                        success.output.clone(),
                        attempts,
                        duration_ms,
                    ));
                    final_output = Some(success.output);
                    match success.control {
                        Control::Continue => index += 1,
                        Control::GoTo(target) => {
                            // Targets are checked by Workflow::validate.
                            index = workflow.step_index(&target).ok_or_else(|| {
                                DomainError::internal(format!("unknown step '{target}'"))
                            })?;
                        }
                        Control::End(output) => {
                            if output.is_some() {
                                final_output = output;
                            }
                            break;
                        }
                    }
                }
                Err(err) => match step.on_error {
                    OnErrorAction::FailWorkflow => {
                        records.push(StepRecord::failed(
                            &step.name,
                            err.to_string(),
                            attempts,
                            duration_ms,
                        ));
                        return Ok(RunOutcome::failure(
                            format!("step '{}' failed: {err}", step.name),
                            records,
                        ));
                    }
                    OnErrorAction::SkipStep => {
                        records.push(StepRecord::skipped(&step.name, err.to_string()));
                        index += 1;
                    }
                },
            }
        }

        Ok(RunOutcome::success(final_output, records))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::credential::{CredentialId, ProviderKind};
    use crate::domain::execution::StepStatus;
    use crate::domain::llm::LlmProvider;
    use crate::domain::prompt::{PromptId, Variable};
    use crate::domain::workflow::{
        ConditionOperator, DecisionArm, HttpMethod, WorkflowId,
    };
    use crate::infrastructure::credential::ResolvedCredential;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use crate::infrastructure::storage::InMemoryStorage;

    #[derive(Debug)]
    struct MockLlmProvider {
        name: &'static str,
        responses: Mutex<Vec<DomainResult<LlmResponse>>>,
        calls: AtomicUsize,
    }

    impl MockLlmProvider {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                responses: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn push_ok(&self, content: &str) {
            self.responses
                .lock()
                .unwrap()
                .push(Ok(LlmResponse::new(content, "test-model")));
        }

        fn push_err(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push(Err(DomainError::provider(message)));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn complete(&self, _request: &LlmRequest) -> DomainResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(DomainError::provider("mock exhausted"));
            }
            responses.remove(0)
        }

        fn provider_name(&self) -> &str {
            self.name
        }
    }

    /// Routes to mock providers by api key.
    #[derive(Debug, Default)]
    struct MockProviderFactory {
        by_key: HashMap<String, Arc<MockLlmProvider>>,
    }

    impl MockProviderFactory {
        fn with(mut self, api_key: &str, provider: Arc<MockLlmProvider>) -> Self {
            self.by_key.insert(api_key.to_string(), provider);
            self
        }
    }

    impl ProviderFactory for MockProviderFactory {
        fn create(
            &self,
            _kind: ProviderKind,
            api_key: &str,
            _endpoint: Option<&str>,
        ) -> DomainResult<Arc<dyn LlmProvider>> {
            self.by_key
                .get(api_key)
                .cloned()
                .map(|p| p as Arc<dyn LlmProvider>)
                .ok_or_else(|| DomainError::configuration("no mock provider for key"))
        }
    }

    #[derive(Debug, Default)]
    struct MockCredentialResolver {
        credentials: HashMap<String, ResolvedCredential>,
    }

    impl MockCredentialResolver {
        fn with(mut self, id: &str, provider: ProviderKind, api_key: &str) -> Self {
            self.credentials.insert(
                id.to_string(),
                ResolvedCredential {
                    provider,
                    api_key: api_key.to_string(),
                    endpoint: None,
                },
            );
            self
        }
    }

    #[async_trait]
    impl CredentialResolver for MockCredentialResolver {
        async fn resolve(
            &self,
            id: &CredentialId,
            _requester: &UserId,
        ) -> DomainResult<ResolvedCredential> {
            self.credentials
                .get(id.as_str())
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("credential '{id}'")))
        }
    }

    fn owner() -> UserId {
        UserId::new("alice").unwrap()
    }

    async fn prompt_storage() -> Arc<InMemoryStorage<Prompt>> {
        let storage = Arc::new(InMemoryStorage::new());
        let prompt = Prompt::new(
            PromptId::new("summarize").unwrap(),
            "Summarize",
            "Summarize: {{text}}",
            owner(),
        )
        .unwrap()
        .with_variables(vec![Variable::text("text").required()]);
        storage.put(&prompt).await.unwrap();
        storage
    }

    fn route(credential: &str, retries: u32) -> ModelRoute {
        ModelRoute {
            provider: ProviderKind::OpenAi,
            model: "test-model".to_string(),
            credential_id: CredentialId::new(credential).unwrap(),
            retries,
        }
    }

    fn prompt_step(routes: Vec<ModelRoute>, routing: RoutingMode) -> WorkflowStep {
        let mut variables = HashMap::new();
        variables.insert("text".to_string(), "{{input.text}}".to_string());
        WorkflowStep::new(
            "call",
            StepType::Prompt(PromptStep {
                prompt_id: PromptId::new("summarize").unwrap(),
                variables,
                routes,
                routing,
                temperature: None,
                max_tokens: None,
            }),
        )
    }

    fn workflow(steps: Vec<WorkflowStep>) -> Workflow {
        Workflow::new(WorkflowId::new("wf").unwrap(), "WF", owner())
            .unwrap()
            .with_steps(steps)
    }

    async fn executor(
        factory: MockProviderFactory,
        resolver: MockCredentialResolver,
    ) -> StepWorkflowExecutor {
        StepWorkflowExecutor::new(
            prompt_storage().await,
            Arc::new(resolver),
            Arc::new(factory),
            Arc::new(MockHttpClient::new()),
        )
    }

    #[tokio::test]
    async fn test_single_prompt_step_success() {
        let provider = MockLlmProvider::new("open_ai");
        provider.push_ok("a summary");
        let exec = executor(
            MockProviderFactory::default().with("key-a", provider.clone()),
            MockCredentialResolver::default().with("cred-a", ProviderKind::OpenAi, "key-a"),
        )
        .await;

        let wf = workflow(vec![prompt_step(vec![route("cred-a", 0)], RoutingMode::Fallback)]);
        let outcome = exec.run(&wf, json!({"text": "long article"})).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["content"], json!("a summary"));
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].status, StepStatus::Succeeded);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let provider = MockLlmProvider::new("open_ai");
        provider.push_err("503");
        provider.push_err("503 again");
        provider.push_ok("third time lucky");
        let exec = executor(
            MockProviderFactory::default().with("key-a", provider.clone()),
            MockCredentialResolver::default().with("cred-a", ProviderKind::OpenAi, "key-a"),
        )
        .await;

        let wf = workflow(vec![prompt_step(vec![route("cred-a", 2)], RoutingMode::Fallback)]);
        let outcome = exec.run(&wf, json!({"text": "x"})).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.steps[0].attempts, 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_fallback_moves_to_next_route() {
        let failing = MockLlmProvider::new("open_ai");
        failing.push_err("down");
        let backup = MockLlmProvider::new("anthropic");
        backup.push_ok("backup answer");
        let exec = executor(
            MockProviderFactory::default()
                .with("key-a", failing.clone())
                .with("key-b", backup.clone()),
            MockCredentialResolver::default()
                .with("cred-a", ProviderKind::OpenAi, "key-a")
                .with("cred-b", ProviderKind::Anthropic, "key-b"),
        )
        .await;

        let mut second = route("cred-b", 0);
        second.provider = ProviderKind::Anthropic;
        let wf = workflow(vec![prompt_step(
            vec![route("cred-a", 0), second],
            RoutingMode::Fallback,
        )]);
        let outcome = exec.run(&wf, json!({"text": "x"})).await.unwrap();

        assert!(outcome.success);
        let output = outcome.output.unwrap();
        assert_eq!(output["content"], json!("backup answer"));
        assert_eq!(output["failed_routes"][0]["provider"], json!("open_ai"));
        assert_eq!(backup.calls(), 1);
    }

    #[tokio::test]
    async fn test_parallel_first_declared_success_wins() {
        let first = MockLlmProvider::new("open_ai");
        first.push_ok("first");
        let second = MockLlmProvider::new("anthropic");
        second.push_ok("second");
        let exec = executor(
            MockProviderFactory::default()
                .with("key-a", first.clone())
                .with("key-b", second.clone()),
            MockCredentialResolver::default()
                .with("cred-a", ProviderKind::OpenAi, "key-a")
                .with("cred-b", ProviderKind::Anthropic, "key-b"),
        )
        .await;

        let mut alt = route("cred-b", 0);
        alt.provider = ProviderKind::Anthropic;
        let wf = workflow(vec![prompt_step(
            vec![route("cred-a", 0), alt],
            RoutingMode::Parallel,
        )]);
        let outcome = exec.run(&wf, json!({"text": "x"})).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["content"], json!("first"));
        // Parallel mode fans out to every route.
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_routes_failing_fails_step() {
        let provider = MockLlmProvider::new("open_ai");
        provider.push_err("down");
        let exec = executor(
            MockProviderFactory::default().with("key-a", provider),
            MockCredentialResolver::default().with("cred-a", ProviderKind::OpenAi, "key-a"),
        )
        .await;

        let wf = workflow(vec![prompt_step(vec![route("cred-a", 0)], RoutingMode::Fallback)]);
        let outcome = exec.run(&wf, json!({"text": "x"})).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.steps[0].status, StepStatus::Failed);
        assert!(outcome.error.unwrap().contains("call"));
    }

    #[tokio::test]
    async fn test_provider_kind_mismatch_rejected() {
        let provider = MockLlmProvider::new("anthropic");
        let exec = executor(
            MockProviderFactory::default().with("key-a", provider),
            MockCredentialResolver::default().with("cred-a", ProviderKind::Anthropic, "key-a"),
        )
        .await;

        // Route says open_ai, credential is anthropic.
        let wf = workflow(vec![prompt_step(vec![route("cred-a", 0)], RoutingMode::Fallback)]);
        let outcome = exec.run(&wf, json!({"text": "x"})).await.unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_condition_go_to_step() {
        let exec = executor(MockProviderFactory::default(), MockCredentialResolver::default())
            .await;
        let wf = workflow(vec![
            WorkflowStep::new(
                "check",
                StepType::Condition(ConditionStep {
                    field: "{{input.kind}}".to_string(),
                    operator: ConditionOperator::Equals,
                    value: Some("urgent".to_string()),
                    then: BranchAction::GoToStep { step: "late".to_string() },
                    otherwise: BranchAction::Continue,
                }),
            ),
            WorkflowStep::new("early", StepType::Delay(DelayStep { duration_ms: 1 })),
            WorkflowStep::new("late", StepType::Delay(DelayStep { duration_ms: 1 })),
        ]);

        let outcome = exec.run(&wf, json!({"kind": "urgent"})).await.unwrap();
        assert!(outcome.success);
        let names: Vec<_> = outcome.steps.iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(names, vec!["check", "late"]);
    }

    #[tokio::test]
    async fn test_condition_end_workflow_with_output() {
        let exec = executor(MockProviderFactory::default(), MockCredentialResolver::default())
            .await;
        let wf = workflow(vec![
            WorkflowStep::new(
                "gate",
                StepType::Condition(ConditionStep {
                    field: "{{input.text}}".to_string(),
                    operator: ConditionOperator::IsEmpty,
                    value: None,
                    then: BranchAction::EndWorkflow {
                        output: Some(json!({"reason": "empty input"})),
                    },
                    otherwise: BranchAction::Continue,
                }),
            ),
            WorkflowStep::new("never", StepType::Delay(DelayStep { duration_ms: 1 })),
        ]);

        let outcome = exec.run(&wf, json!({"text": ""})).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["reason"], json!("empty input"));
        assert_eq!(outcome.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_transform_chain() {
        let exec = executor(MockProviderFactory::default(), MockCredentialResolver::default())
            .await;
        let wf = workflow(vec![
            WorkflowStep::new(
                "parse",
                StepType::Transform(TransformStep {
                    input: "{{input.raw}}".to_string(),
                    op: TransformOp::ParseJson,
                }),
            ),
            WorkflowStep::new(
                "pick",
                StepType::Transform(TransformStep {
                    input: "{{steps.parse}}".to_string(),
                    op: TransformOp::ExtractPath { path: "user.name".to_string() },
                }),
            ),
            WorkflowStep::new(
                "shout",
                StepType::Transform(TransformStep {
                    input: "{{steps.pick}}".to_string(),
                    op: TransformOp::Uppercase,
                }),
            ),
        ]);

        let outcome = exec
            .run(&wf, json!({"raw": "{\"user\": {\"name\": \"ada\"}}"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap(), json!("ADA"));
    }

    #[tokio::test]
    async fn test_transform_template_renders_against_context() {
        let exec = executor(MockProviderFactory::default(), MockCredentialResolver::default())
            .await;
        let wf = workflow(vec![
            WorkflowStep::new(
                "trim",
                StepType::Transform(TransformStep {
                    input: "{{input.name}}".to_string(),
                    op: TransformOp::Trim,
                }),
            ),
            WorkflowStep::new(
                "greet",
                StepType::Transform(TransformStep {
                    // The template pulls from the context on its own; the
                    // input expression is not consulted.
                    input: String::new(),
                    op: TransformOp::Template {
                        template: "Hello {{steps.trim}}, welcome to {{input.place}}".to_string(),
                    },
                }),
            ),
        ]);

        let outcome = exec
            .run(&wf, json!({"name": "  Ada  ", "place": "Rust"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap(), json!("Hello Ada, welcome to Rust"));
    }

    #[tokio::test]
    async fn test_webhook_step_posts_resolved_body() {
        let http = Arc::new(MockHttpClient::new());
        http.push_response(200, json!({"ok": true}));
        let exec = StepWorkflowExecutor::new(
            prompt_storage().await,
            Arc::new(MockCredentialResolver::default()),
            Arc::new(MockProviderFactory::default()),
            http.clone(),
        );

        let mut headers = HashMap::new();
        headers.insert("x-source".to_string(), "promptdeck".to_string());
        let wf = workflow(vec![WorkflowStep::new(
            "notify",
            StepType::Webhook(WebhookStep {
                url: "https://hooks.example.com/{{input.channel}}".to_string(),
                method: HttpMethod::Post,
                headers,
                body: Some(json!({"text": "{{input.message}}"})),
                fail_on_error: true,
            }),
        )]);

        let outcome = exec
            .run(&wf, json!({"channel": "alerts", "message": "done"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["status"], json!(200));

        let sent = http.requests();
        assert_eq!(sent[0].url, "https://hooks.example.com/alerts");
        assert_eq!(sent[0].body.as_ref().unwrap()["text"], json!("done"));
    }

    #[tokio::test]
    async fn test_webhook_tolerates_error_when_configured() {
        let http = Arc::new(MockHttpClient::new());
        http.push_response(500, json!("boom"));
        let exec = StepWorkflowExecutor::new(
            prompt_storage().await,
            Arc::new(MockCredentialResolver::default()),
            Arc::new(MockProviderFactory::default()),
            http,
        );

        let wf = workflow(vec![WorkflowStep::new(
            "notify",
            StepType::Webhook(WebhookStep {
                url: "https://hooks.example.com/a".to_string(),
                method: HttpMethod::Post,
                headers: HashMap::new(),
                body: None,
                fail_on_error: false,
            }),
        )]);

        let outcome = exec.run(&wf, json!({})).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["status"], json!(500));
    }

    #[tokio::test]
    async fn test_decision_picks_first_matching_arm() {
        let exec = executor(MockProviderFactory::default(), MockCredentialResolver::default())
            .await;
        let arm = |value: &str, target: &str| DecisionArm {
            field: "{{input.lang}}".to_string(),
            operator: ConditionOperator::Equals,
            value: Some(value.to_string()),
            then: BranchAction::GoToStep { step: target.to_string() },
        };
        let wf = workflow(vec![
            WorkflowStep::new(
                "route",
                StepType::Decision(DecisionStep {
                    arms: vec![arm("fr", "french"), arm("de", "german")],
                    default_action: BranchAction::EndWorkflow { output: None },
                }),
            ),
            WorkflowStep::new("french", StepType::Delay(DelayStep { duration_ms: 1 })),
            WorkflowStep::new("german", StepType::Delay(DelayStep { duration_ms: 1 })),
        ]);

        let outcome = exec.run(&wf, json!({"lang": "de"})).await.unwrap();
        let names: Vec<_> = outcome.steps.iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(names, vec!["route", "german"]);

        let outcome = exec.run(&wf, json!({"lang": "xx"})).await.unwrap();
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].output.as_ref().unwrap()["matched_arm"], Value::Null);
    }

    #[tokio::test]
    async fn test_on_error_skip_step_continues() {
        let exec = executor(
            MockProviderFactory::default(),
            MockCredentialResolver::default(),
        )
        .await;
        let wf = workflow(vec![
            WorkflowStep::new(
                "flaky",
                StepType::Transform(TransformStep {
                    input: "{{input.absent}}".to_string(),
                    op: TransformOp::Trim,
                }),
            )
            .with_on_error(OnErrorAction::SkipStep),
            WorkflowStep::new("after", StepType::Delay(DelayStep { duration_ms: 1 })),
        ]);

        let outcome = exec.run(&wf, json!({})).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.steps[0].status, StepStatus::Skipped);
        assert_eq!(outcome.steps[1].step_name, "after");
    }

    #[tokio::test]
    async fn test_cycle_is_cut_off() {
        let exec = executor(MockProviderFactory::default(), MockCredentialResolver::default())
            .await;
        let wf = workflow(vec![
            WorkflowStep::new(
                "ping",
                StepType::Condition(ConditionStep {
                    field: "{{input.x|1}}".to_string(),
                    operator: ConditionOperator::IsNotEmpty,
                    value: None,
                    then: BranchAction::GoToStep { step: "pong".to_string() },
                    otherwise: BranchAction::Continue,
                }),
            ),
            WorkflowStep::new(
                "pong",
                StepType::Condition(ConditionStep {
                    field: "{{input.x|1}}".to_string(),
                    operator: ConditionOperator::IsNotEmpty,
                    value: None,
                    then: BranchAction::GoToStep { step: "ping".to_string() },
                    otherwise: BranchAction::Continue,
                }),
            ),
        ]);

        let outcome = exec.run(&wf, json!({})).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("transitions"));
    }

    #[tokio::test]
    async fn test_empty_workflow_rejected() {
        let exec = executor(MockProviderFactory::default(), MockCredentialResolver::default())
            .await;
        let wf = workflow(vec![]);
        assert!(exec.run(&wf, json!({})).await.is_err());
    }
}
