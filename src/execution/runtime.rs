//! Pipeline runtime - runs one named step or a contiguous range of steps

use crate::{
    core::{Pipeline, RunState, Step, StepContext, StepError},
    data::Connector,
    execution::{ExecutionResult, StepExecutor},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs the steps of an instantiated pipeline, in list order, stopping at
/// the first failure
pub struct PipelineRuntime<'p> {
    pipeline: &'p dyn Pipeline,
    connector: Arc<dyn Connector>,
    executor: StepExecutor,
    state: RunState,
}

impl<'p> PipelineRuntime<'p> {
    pub fn new(pipeline: &'p dyn Pipeline, connector: Arc<dyn Connector>) -> Self {
        Self {
            pipeline,
            connector,
            executor: StepExecutor::new(),
            state: RunState::Idle,
        }
    }

    pub fn name(&self) -> &str {
        self.pipeline.name()
    }

    pub fn steps(&self) -> &'p [Step] {
        self.pipeline.steps()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the first step named `name`. Returns whether it succeeded.
    pub fn run_step(&mut self, name: &str) -> bool {
        let steps = self.steps();

        let Some((index, step)) = steps.iter().enumerate().find(|(_, s)| s.name() == name) else {
            let err = StepError::StepNotFound {
                step: name.to_string(),
                pipeline: self.name().to_string(),
            };
            error!(step = name, pipeline = self.name(), "{}", err);
            self.state = RunState::Halted { failed_at: None };
            return false;
        };

        debug!(
            "Found {} at Step #{} in {}. Running...",
            name,
            index,
            self.name()
        );

        let success = self.execute(index, step);
        if !success {
            error!(
                step = name,
                pipeline = self.name(),
                index,
                "Step {} failed in {} (Step: {})",
                name,
                self.name(),
                index
            );
        }
        self.state = RunState::Halted {
            failed_at: (!success).then_some(index),
        };
        success
    }

    /// Run the step at `start`, and every later step when `to_end` is set.
    ///
    /// Stops at the first step that fails or faults; later steps are never
    /// attempted. Returns true only if the whole selected range succeeded.
    pub fn run_range(&mut self, start: usize, to_end: bool) -> bool {
        let steps = self.steps();

        if start >= steps.len() {
            error!(
                pipeline = self.name(),
                index = start,
                "Step #{} does not exist in {} ({} steps)",
                start,
                self.name(),
                steps.len()
            );
            self.state = RunState::Halted { failed_at: None };
            return false;
        }

        let end = if to_end { steps.len() } else { start + 1 };

        for (index, step) in steps.iter().enumerate().take(end).skip(start) {
            debug!("Running {} at Step #{} in {}...", step.name(), index, self.name());

            if !self.execute(index, step) {
                error!(
                    step = step.name(),
                    pipeline = self.name(),
                    index,
                    "Aborting {} due to failure in {} (Step: {})",
                    step.name(),
                    self.name(),
                    index
                );
                self.state = RunState::Halted {
                    failed_at: Some(index),
                };
                return false;
            }
        }

        info!(pipeline = self.name(), "Completed steps {}..{}", start, end);
        self.state = RunState::Halted { failed_at: None };
        true
    }

    /// Run every step from the first. An empty pipeline trivially succeeds.
    pub fn run_all(&mut self) -> bool {
        if self.steps().is_empty() {
            warn!(pipeline = self.name(), "Pipeline has no steps");
            self.state = RunState::Halted { failed_at: None };
            return true;
        }
        self.run_range(0, true)
    }

    fn execute(&mut self, index: usize, step: &Step) -> bool {
        self.state = RunState::Running { index };

        let ctx = StepContext::new(
            self.pipeline.base(),
            step.name(),
            index,
            self.connector.as_ref(),
        );
        let result = self.executor.execute(step, &ctx);

        self.state = match result {
            ExecutionResult::Success => RunState::StepSucceeded { index },
            _ => RunState::StepFailed { index },
        };
        result.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineBase;
    use crate::data::UnavailableConnector;
    use std::path::Path;

    struct Fixed {
        base: PipelineBase,
        steps: Vec<Step>,
    }

    impl Pipeline for Fixed {
        fn new(path: &Path) -> anyhow::Result<Self> {
            Ok(Self {
                base: PipelineBase::with_settings(path, None),
                steps: vec![
                    Step::new("first", |_| Ok(true)),
                    Step::new("second", |_| Ok(false)),
                    Step::new("third", |_| Ok(true)),
                ],
            })
        }

        fn base(&self) -> &PipelineBase {
            &self.base
        }

        fn steps(&self) -> &[Step] {
            &self.steps
        }
    }

    fn pipeline() -> Fixed {
        Fixed::new(Path::new("/tmp/pipelines/fixed")).unwrap()
    }

    #[test]
    fn test_initial_state_is_idle() {
        let pipeline = pipeline();
        let runtime = PipelineRuntime::new(&pipeline, Arc::new(UnavailableConnector));
        assert_eq!(runtime.state(), RunState::Idle);
        assert_eq!(runtime.name(), "fixed");
    }

    #[test]
    fn test_run_range_halts_at_failure() {
        let pipeline = pipeline();
        let mut runtime = PipelineRuntime::new(&pipeline, Arc::new(UnavailableConnector));

        assert!(!runtime.run_range(0, true));
        assert_eq!(runtime.state(), RunState::Halted { failed_at: Some(1) });
    }

    #[test]
    fn test_single_step_range() {
        let pipeline = pipeline();
        let mut runtime = PipelineRuntime::new(&pipeline, Arc::new(UnavailableConnector));

        assert!(runtime.run_range(2, false));
        assert_eq!(runtime.state(), RunState::Halted { failed_at: None });
    }

    #[test]
    fn test_out_of_range_start() {
        let pipeline = pipeline();
        let mut runtime = PipelineRuntime::new(&pipeline, Arc::new(UnavailableConnector));

        assert!(!runtime.run_range(3, false));
        assert_eq!(runtime.state(), RunState::Halted { failed_at: None });
    }

    #[test]
    fn test_run_step_not_found() {
        let pipeline = pipeline();
        let mut runtime = PipelineRuntime::new(&pipeline, Arc::new(UnavailableConnector));

        assert!(!runtime.run_step("missing"));
        assert!(runtime.run_step("third"));
        assert!(!runtime.run_step("second"));
        assert_eq!(runtime.state(), RunState::Halted { failed_at: Some(1) });
    }
}
