//! Step domain model

use crate::core::fault::catch_step;
use crate::core::{AuditLog, PipelineBase, StepError};
use crate::data::{Connector, DataConnection};
use std::fmt;

/// The work a step performs. Returning `Ok(false)` marks the step failed;
/// an `Err` is a fault and is logged with its full chain.
pub type StepAction = Box<dyn Fn(&StepContext<'_>) -> anyhow::Result<bool> + Send + Sync>;

/// A single named step in a pipeline
pub struct Step {
    /// Step name, used as the selector and the audit file name
    name: String,

    action: StepAction,
}

impl Step {
    /// Create a step from a closure. A panic in `action` is caught here and
    /// returned as a [`StepPanic`](crate::core::StepPanic) error.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move |ctx: &StepContext<'_>| catch_step(|| action(ctx))),
        }
    }

    /// Create a step that runs `sql` against the named connection.
    ///
    /// The text is split on `GO` lines and each exec-unit is submitted in
    /// order; see [`StepContext::execute_sql`].
    pub fn sql(
        name: impl Into<String>,
        connection: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        let connection = connection.into();
        let sql = sql.into();
        Self::new(name, move |ctx| Ok(ctx.execute_sql(&connection, &sql)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action. Faults are returned, not logged; the executor owns that.
    pub(crate) fn invoke(&self, ctx: &StepContext<'_>) -> anyhow::Result<bool> {
        (self.action)(ctx)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish_non_exhaustive()
    }
}

/// What a running step can see of its pipeline
pub struct StepContext<'a> {
    pipeline: &'a PipelineBase,
    step: &'a str,
    index: usize,
    connector: &'a dyn Connector,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        pipeline: &'a PipelineBase,
        step: &'a str,
        index: usize,
        connector: &'a dyn Connector,
    ) -> Self {
        Self {
            pipeline,
            step,
            index,
            connector,
        }
    }

    pub fn pipeline(&self) -> &PipelineBase {
        self.pipeline
    }

    pub fn pipeline_name(&self) -> &str {
        self.pipeline.name()
    }

    pub fn step_name(&self) -> &str {
        self.step
    }

    /// Zero-based position of the step in the pipeline
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn audit(&self) -> AuditLog {
        self.pipeline.audit_log()
    }

    /// Open the named connection. The handle closes when dropped, so keep
    /// it scoped to the step.
    pub fn connect(&self, connection: &str) -> Result<Box<dyn DataConnection>, StepError> {
        let definition = self.pipeline.connection(connection)?;
        Ok(self.connector.open(definition)?)
    }

    /// Persist `sql` as this step's audit record, then submit each exec-unit
    /// to `connection` in order, stopping at the first failure.
    pub fn execute_sql(&self, connection: &str, sql: &str) -> bool {
        crate::execution::sql::execute_sql(self, connection, sql)
    }
}
