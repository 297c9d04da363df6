//! Run state of a pipeline runtime

use serde::{Deserialize, Serialize};

/// Where a pipeline run currently stands
///
/// `Idle -> Running -> StepSucceeded | StepFailed -> (next step | Halted)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Nothing has run yet
    Idle,
    /// A step is executing
    Running { index: usize },
    /// The step at `index` returned success
    StepSucceeded { index: usize },
    /// The step at `index` returned failure or raised a fault
    StepFailed { index: usize },
    /// The selected range finished. `failed_at` holds the step that stopped
    /// the run, if any; a missing step or bad index halts with `None` and
    /// reports failure through the return value only.
    Halted { failed_at: Option<usize> },
}

impl RunState {
    /// Check if the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Halted { .. })
    }

    /// Index of the step that halted the run, if one failed
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            RunState::Halted { failed_at } => *failed_at,
            RunState::StepFailed { index } => Some(*index),
            _ => None,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Idle
    }
}
