pub mod entity;

pub use entity::{ExecutionStatus, RunOutcome, StepRecord, StepStatus, WorkflowExecution};
