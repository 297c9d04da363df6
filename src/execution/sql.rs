//! The SQL-batch step action

use crate::core::{batch::split_batches, StepContext, StepError};
use tracing::{debug, error};

/// Extension used for SQL audit records
pub const SQL_AUDIT_EXTENSION: &str = "sql";

/// Run `sql` against `connection` on behalf of the step in `ctx`.
///
/// The text is written to the step's audit record before anything is
/// submitted, so the record reflects the attempt whatever its outcome. The
/// connection is held only for the duration of this call.
pub(crate) fn execute_sql(ctx: &StepContext<'_>, connection: &str, sql: &str) -> bool {
    let audit = ctx.audit();
    if let Err(source) = audit.record(ctx.step_name(), SQL_AUDIT_EXTENSION, sql) {
        let err = StepError::Audit {
            path: audit.path_for(ctx.step_name(), SQL_AUDIT_EXTENSION),
            source,
        };
        error!(
            step = ctx.step_name(),
            pipeline = ctx.pipeline_name(),
            index = ctx.index(),
            "ExecuteSql failed, {}",
            err
        );
        return false;
    }

    let mut cn = match ctx.connect(connection) {
        Ok(cn) => cn,
        Err(e) => {
            error!(
                step = ctx.step_name(),
                pipeline = ctx.pipeline_name(),
                index = ctx.index(),
                connection,
                "ExecuteSql failed, {}",
                e
            );
            return false;
        }
    };

    let batches = split_batches(sql);
    for (n, batch) in batches.iter().enumerate() {
        if let Err(e) = cn.execute(batch, &[]) {
            error!(
                step = ctx.step_name(),
                pipeline = ctx.pipeline_name(),
                index = ctx.index(),
                connection,
                batch = n,
                "ExecuteSql failed\nQuery:\n-----------\n{}\n\nMessage:\n-----------\n{}\n",
                batch,
                e
            );
            return false;
        }
    }

    debug!(
        "Pipeline: {}, Step: {} complete ({} exec-units)",
        ctx.pipeline_name(),
        ctx.index(),
        batches.len()
    );
    true
}
