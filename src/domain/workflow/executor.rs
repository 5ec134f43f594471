use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::DomainResult;
use crate::domain::execution::RunOutcome;
use crate::domain::workflow::entity::Workflow;

/// Runs a workflow against a trigger input. Step failures are reported
/// inside the [`RunOutcome`]; `Err` is reserved for conditions that make
/// running impossible at all (e.g. an invalid step list).
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + Debug {
    async fn run(&self, workflow: &Workflow, input: Value) -> DomainResult<RunOutcome>;
}
