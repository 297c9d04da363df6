//! pipeliner - builds a directory of pipeline steps and runs them

pub mod cli;
pub mod core;
pub mod data;
pub mod execution;
pub mod host;

// Re-export commonly used types
pub use anyhow;
pub use core::{Pipeline, PipelineBase, RunState, Step, StepContext, StepError, PIPELINE_CONTRACT};
pub use data::{Connector, DataConnection, DataError, ResultSet, SqlValue};
pub use execution::{ExecutionResult, PipelineRuntime, StepExecutor};
pub use host::{HostConfig, HostError, PipelineHost, UnitTypes};
