//! Step executor - runs one step and turns every fault into a failed result

use crate::core::{Step, StepContext, StepPanic};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

/// Result of executing a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The action returned success
    Success,
    /// The action returned failure
    Failed,
    /// The action raised an error or panicked
    Faulted { message: String, trace: String },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success)
    }
}

/// Executes a single step
#[derive(Debug, Clone, Copy, Default)]
pub struct StepExecutor;

impl StepExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a step. Faults never propagate; they are logged with the step
    /// name, pipeline name, index, message and trace, and reported as
    /// [`ExecutionResult::Faulted`].
    pub fn execute(&self, step: &Step, ctx: &StepContext<'_>) -> ExecutionResult {
        debug!(
            step = step.name(),
            pipeline = ctx.pipeline_name(),
            index = ctx.index(),
            "Executing step"
        );

        let result = match panic::catch_unwind(AssertUnwindSafe(|| step.invoke(ctx))) {
            Ok(Ok(true)) => ExecutionResult::Success,
            Ok(Ok(false)) => ExecutionResult::Failed,
            Ok(Err(fault)) => match fault.downcast_ref::<StepPanic>() {
                Some(panicked) => panicked.into(),
                None => ExecutionResult::Faulted {
                    message: format!("{:#}", fault),
                    trace: format!("{:?}", fault),
                },
            },
            Err(payload) => (&StepPanic::from_payload(payload.as_ref())).into(),
        };

        if let ExecutionResult::Faulted { message, trace } = &result {
            error!(
                step = step.name(),
                pipeline = ctx.pipeline_name(),
                index = ctx.index(),
                message = %message,
                trace = %trace,
                "Aborting {} due to an error in {} (Step: {})\nMessage: {}\n----------\n{}",
                step.name(),
                ctx.pipeline_name(),
                ctx.index(),
                message,
                trace
            );
        }

        result
    }
}

impl From<&StepPanic> for ExecutionResult {
    fn from(panicked: &StepPanic) -> Self {
        ExecutionResult::Faulted {
            message: panicked.message().to_string(),
            trace: panicked.trace().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineBase;
    use crate::data::UnavailableConnector;

    fn run(step: &Step) -> ExecutionResult {
        let base = PipelineBase::with_settings("/tmp/pipelines/unit", None);
        let connector = UnavailableConnector;
        let ctx = StepContext::new(&base, step.name(), 0, &connector);
        StepExecutor::new().execute(step, &ctx)
    }

    #[test]
    fn test_success_and_failure() {
        assert_eq!(run(&Step::new("ok", |_| Ok(true))), ExecutionResult::Success);
        assert_eq!(run(&Step::new("no", |_| Ok(false))), ExecutionResult::Failed);
    }

    #[test]
    fn test_error_becomes_fault() {
        let step = Step::new("boom", |_| Err(anyhow::anyhow!("disk full").context("writing extract")));

        match run(&step) {
            ExecutionResult::Faulted { message, .. } => {
                assert!(message.contains("writing extract"));
                assert!(message.contains("disk full"));
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_panic_becomes_fault() {
        let step = Step::new("panics", |_| panic!("index out of bounds"));

        match run(&step) {
            ExecutionResult::Faulted { message, trace } => {
                assert_eq!(message, "index out of bounds");
                assert!(!trace.is_empty());
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }
}
