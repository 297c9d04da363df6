//! Pipeline execution: the runtime, the step executor and the SQL action

pub mod executor;
pub mod runtime;
pub mod sql;

pub use executor::{ExecutionResult, StepExecutor};
pub use runtime::PipelineRuntime;
