pub mod executor_impl;

pub use executor_impl::StepWorkflowExecutor;
