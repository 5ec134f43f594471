pub mod context;
pub mod entity;
pub mod executor;
pub mod step_types;

pub use context::WorkflowContext;
pub use entity::{OnErrorAction, Workflow, WorkflowId, WorkflowStep};
pub use executor::WorkflowExecutor;
pub use step_types::{
    BranchAction, ConditionOperator, ConditionStep, DecisionArm, DecisionStep, DelayStep,
    HttpMethod, ModelRoute, PromptStep, RoutingMode, StepType, TransformOp, TransformStep,
    WebhookStep,
};
